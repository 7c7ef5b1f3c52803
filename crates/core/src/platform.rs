use async_trait::async_trait;
use thiserror::Error;

use crate::domain::activity::ActivityItem;
use crate::domain::content::{ContentItem, PostedItem, TimeWindow};
use crate::domain::identity::{Author, Identity};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("platform client is not authenticated")]
    Unauthenticated,
    #[error("platform transport failed: {0}")]
    Transport(String),
    #[error("platform returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("platform response could not be decoded: {0}")]
    Decode(String),
}

/// The rate-limited platform the agent acts on.
///
/// Calls are issued strictly one at a time by the pipeline; implementations
/// do not need to tolerate overlapping requests.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform_name(&self) -> &'static str;

    async fn authenticate(&self) -> Result<Identity, PlatformError>;

    /// Newest first. `limit` bounds each underlying listing (posts and
    /// comments separately).
    async fn fetch_recent_activity(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> Result<Vec<ActivityItem>, PlatformError>;

    async fn search(
        &self,
        scope: &str,
        query: &str,
        window: TimeWindow,
        limit: usize,
    ) -> Result<Vec<ContentItem>, PlatformError>;

    async fn list_repliers(
        &self,
        item: &ContentItem,
        limit: usize,
    ) -> Result<Vec<Author>, PlatformError>;

    async fn post_reply(&self, item: &ContentItem, text: &str)
        -> Result<PostedItem, PlatformError>;
}
