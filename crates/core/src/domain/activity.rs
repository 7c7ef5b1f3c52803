use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Post,
    Comment,
}

/// One entry of the account's recent history, as fetched for this run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub kind: ActivityKind,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl ActivityItem {
    pub fn post(body: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self { kind: ActivityKind::Post, body: body.into(), created_at }
    }

    pub fn comment(body: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self { kind: ActivityKind::Comment, body: body.into(), created_at }
    }

    pub fn is_post(&self) -> bool {
        self.kind == ActivityKind::Post
    }

    /// Literal substring match. Shortened or rewritten forms of the link are
    /// not detected.
    pub fn contains_link(&self, link: &str) -> bool {
        !link.is_empty() && self.body.contains(link)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityRatio {
    pub total: usize,
    pub promotional: usize,
    /// `None` when the sample is too small to judge.
    pub ratio: Option<f64>,
}

impl ActivityRatio {
    pub fn percent(&self) -> Option<f64> {
        self.ratio.map(|ratio| ratio * 100.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateWindow {
    pub posts_in_window: usize,
    /// `None` when the account has never posted.
    pub hours_since_last: Option<f64>,
}
