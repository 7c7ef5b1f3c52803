use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::identity::{Author, Identity};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(pub String);

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A thread found by search that the agent may reply to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    /// Community the item was found in.
    pub scope: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub score: i64,
    /// Bounded prefix of the accounts that already replied.
    pub existing_repliers: Vec<Author>,
}

impl ContentItem {
    pub fn replied_by(&self, identity: &Identity) -> bool {
        self.existing_repliers.iter().any(|author| identity.matches(author))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    Hour,
    Day,
    #[default]
    Week,
    Month,
    Year,
    All,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }
}

impl FromStr for TimeWindow {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "all" => Ok(Self::All),
            other => Err(DomainError::UnknownVariant {
                kind: "time window",
                value: other.to_string(),
                expected: "hour|day|week|month|year|all",
            }),
        }
    }
}

/// When the outbound link may appear in a generated reply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkPolicy {
    Always,
    #[default]
    FollowUpOnly,
    Never,
}

impl LinkPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "ALWAYS",
            Self::FollowUpOnly => "FOLLOW_UP_ONLY",
            Self::Never => "NEVER",
        }
    }

    pub fn appends_link(&self) -> bool {
        matches!(self, Self::Always)
    }
}

impl FromStr for LinkPolicy {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "ALWAYS" => Ok(Self::Always),
            "FOLLOW_UP_ONLY" => Ok(Self::FollowUpOnly),
            "NEVER" => Ok(Self::Never),
            other => Err(DomainError::UnknownVariant {
                kind: "link policy",
                value: other.to_string(),
                expected: "ALWAYS|FOLLOW_UP_ONLY|NEVER",
            }),
        }
    }
}

/// A reply that the platform accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedItem {
    pub id: String,
    pub permalink: String,
}
