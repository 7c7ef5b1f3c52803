pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod platform;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use domain::activity::{ActivityItem, ActivityKind, ActivityRatio, RateWindow};
pub use domain::content::{ContentId, ContentItem, LinkPolicy, PostedItem, TimeWindow};
pub use domain::generation::GeneratedText;
pub use domain::identity::{Author, Identity};
pub use errors::{ApplicationError, DomainError};
pub use platform::{PlatformClient, PlatformError};
