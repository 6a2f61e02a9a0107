// Domain Layer - Pure business logic and entities

pub mod email_job;
pub mod error;
pub mod error_kind;
pub mod notification;
pub mod stats;

// Re-exports
pub use email_job::{
    dispatch_order, EmailJob, JobId, JobMetadata, JobStatus, Priority, DEFAULT_MAX_RETRIES,
};
pub use error::DomainError;
pub use error_kind::{ErrorKind, KindPolicy, QUOTA_DELAY_FLOOR_MS};
pub use notification::{Notification, NotificationLevel, NotificationType};
pub use stats::QueueStats;
