//! Pre-action safety guards.
//!
//! Guards are pure: they take an already fetched activity snapshot and return
//! a decision. Fetching, logging and auditing belong to the caller. A caller
//! that could not fetch the snapshot must deny through
//! [`GuardDecision::fail_closed`] instead of evaluating an empty history.

pub mod rate;
pub mod ratio;

pub use rate::RateLimitGuard;
pub use ratio::ActivityRatioGuard;

use safepost_core::PlatformError;

#[derive(Clone, Debug, PartialEq)]
pub enum GuardDecision {
    Allow,
    Deny(DenyReason),
}

#[derive(Clone, Debug, PartialEq)]
pub enum DenyReason {
    WeeklyCap { posts_in_window: usize, max_posts: u32 },
    MinSpacing { hours_since_last: f64, min_hours: f64 },
    PromotionalRatio { ratio: f64, max_ratio: f64 },
    FetchFailed { detail: String },
}

impl GuardDecision {
    pub fn fail_closed(error: &PlatformError) -> Self {
        Self::Deny(DenyReason::FetchFailed { detail: error.to_string() })
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Allow => None,
            Self::Deny(reason) => Some(reason),
        }
    }
}

impl DenyReason {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::WeeklyCap { .. } => "WEEKLY_CAP",
            Self::MinSpacing { .. } => "MIN_SPACING",
            Self::PromotionalRatio { .. } => "PROMOTIONAL_RATIO",
            Self::FetchFailed { .. } => "FETCH_FAILED",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::WeeklyCap { posts_in_window, max_posts } => {
                format!("{posts_in_window} posts in window, limit is {max_posts}")
            }
            Self::MinSpacing { hours_since_last, min_hours } => {
                format!("last post {hours_since_last:.1}h ago, minimum spacing is {min_hours}h")
            }
            Self::PromotionalRatio { ratio, max_ratio } => format!(
                "promotional ratio {:.1}% exceeds {:.1}%",
                ratio * 100.0,
                max_ratio * 100.0
            ),
            Self::FetchFailed { detail } => format!("activity could not be fetched: {detail}"),
        }
    }
}
