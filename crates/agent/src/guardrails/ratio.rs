use safepost_core::config::{ActionConfig, SafetyConfig};
use safepost_core::{ActivityItem, ActivityRatio};

use super::{DenyReason, GuardDecision};

/// Keeps promotional content a small share of the account's recent activity.
#[derive(Clone, Debug, PartialEq)]
pub struct ActivityRatioGuard {
    outbound_link: String,
    max_ratio: f64,
    min_sample: usize,
}

impl ActivityRatioGuard {
    pub fn new(outbound_link: impl Into<String>, max_ratio: f64, min_sample: usize) -> Self {
        Self { outbound_link: outbound_link.into(), max_ratio, min_sample }
    }

    pub fn from_config(safety: &SafetyConfig, actions: &ActionConfig) -> Self {
        Self::new(
            actions.outbound_link.clone(),
            safety.max_promotional_ratio,
            safety.min_activity_sample,
        )
    }

    pub fn measure(&self, activity: &[ActivityItem]) -> ActivityRatio {
        let total = activity.len();
        let promotional =
            activity.iter().filter(|item| item.contains_link(&self.outbound_link)).count();
        let ratio = (total >= self.min_sample && total > 0)
            .then(|| promotional as f64 / total as f64);

        ActivityRatio { total, promotional, ratio }
    }

    /// Samples smaller than the minimum are allowed: a new account has no
    /// history to judge.
    pub fn evaluate(&self, activity: &[ActivityItem]) -> GuardDecision {
        match self.measure(activity).ratio {
            Some(ratio) if ratio > self.max_ratio => {
                GuardDecision::Deny(DenyReason::PromotionalRatio {
                    ratio,
                    max_ratio: self.max_ratio,
                })
            }
            _ => GuardDecision::Allow,
        }
    }
}
