use chrono::{DateTime, Duration, Utc};
use safepost_core::config::SafetyConfig;
use safepost_core::{ActivityItem, RateWindow};

use super::{DenyReason, GuardDecision};

/// Weekly post ceiling plus a minimum gap between consecutive posts.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitGuard {
    max_posts: u32,
    min_hours: f64,
    window: Duration,
}

impl RateLimitGuard {
    pub fn new(max_posts: u32, min_hours: f64, window: Duration) -> Self {
        Self { max_posts, min_hours, window }
    }

    pub fn from_config(safety: &SafetyConfig) -> Self {
        Self::new(
            safety.max_posts_per_week,
            safety.min_hours_between_posts,
            Duration::days(i64::from(safety.rate_window_days)),
        )
    }

    /// Only `Post` items count; comments in the snapshot are ignored.
    pub fn window(&self, activity: &[ActivityItem], now: DateTime<Utc>) -> RateWindow {
        let window_start = now - self.window;
        let posts = activity.iter().filter(|item| item.is_post());

        let mut posts_in_window = 0;
        let mut latest: Option<DateTime<Utc>> = None;
        for post in posts {
            if post.created_at > window_start {
                posts_in_window += 1;
            }
            latest = Some(latest.map_or(post.created_at, |seen| seen.max(post.created_at)));
        }

        let hours_since_last =
            latest.map(|last| (now - last).num_milliseconds() as f64 / 3_600_000.0);

        RateWindow { posts_in_window, hours_since_last }
    }

    pub fn evaluate(&self, activity: &[ActivityItem], now: DateTime<Utc>) -> GuardDecision {
        let window = self.window(activity, now);

        if window.posts_in_window >= self.max_posts as usize {
            return GuardDecision::Deny(DenyReason::WeeklyCap {
                posts_in_window: window.posts_in_window,
                max_posts: self.max_posts,
            });
        }

        if let Some(hours_since_last) = window.hours_since_last {
            if hours_since_last < self.min_hours {
                return GuardDecision::Deny(DenyReason::MinSpacing {
                    hours_since_last,
                    min_hours: self.min_hours,
                });
            }
        }

        GuardDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use safepost_core::ActivityItem;

    use super::RateLimitGuard;
    use crate::guardrails::{DenyReason, GuardDecision};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 8, 18, 0, 0).single().unwrap_or_default()
    }

    fn guard() -> RateLimitGuard {
        RateLimitGuard::new(3, 4.0, Duration::days(7))
    }

    fn post_hours_ago(hours: i64) -> ActivityItem {
        ActivityItem::post("restoration notes", now() - Duration::hours(hours))
    }

    fn reason_code(decision: &GuardDecision) -> Option<&'static str> {
        decision.deny_reason().map(DenyReason::reason_code)
    }

    #[test]
    fn empty_history_is_allowed() {
        assert_eq!(guard().evaluate(&[], now()), GuardDecision::Allow);
        assert_eq!(guard().window(&[], now()).hours_since_last, None);
    }

    #[test]
    fn weekly_cap_denies_at_limit() {
        let posts = vec![post_hours_ago(10), post_hours_ago(30), post_hours_ago(100)];
        assert_eq!(reason_code(&guard().evaluate(&posts, now())), Some("WEEKLY_CAP"));
    }

    #[test]
    fn posts_outside_window_do_not_count() {
        let posts = vec![post_hours_ago(10), post_hours_ago(30), post_hours_ago(7 * 24)];
        let window = guard().window(&posts, now());
        assert_eq!(window.posts_in_window, 2);
        assert_eq!(guard().evaluate(&posts, now()), GuardDecision::Allow);
    }

    #[test]
    fn spacing_denies_recent_post_and_allows_older_one() {
        let recent = vec![post_hours_ago(3)];
        assert_eq!(reason_code(&guard().evaluate(&recent, now())), Some("MIN_SPACING"));

        let older = vec![post_hours_ago(5)];
        assert_eq!(guard().evaluate(&older, now()), GuardDecision::Allow);
    }

    #[test]
    fn spacing_uses_most_recent_post_regardless_of_order() {
        let posts = vec![post_hours_ago(50), post_hours_ago(2), post_hours_ago(20)];
        let window = guard().window(&posts, now());
        assert!(window.hours_since_last.is_some_and(|hours| (hours - 2.0).abs() < 1e-9));
    }

    #[test]
    fn comments_are_ignored() {
        let activity = vec![
            ActivityItem::comment("quick tip", now() - Duration::minutes(5)),
            ActivityItem::comment("another tip", now() - Duration::minutes(10)),
            ActivityItem::comment("more tips", now() - Duration::minutes(15)),
        ];
        assert_eq!(guard().evaluate(&activity, now()), GuardDecision::Allow);
    }
}
