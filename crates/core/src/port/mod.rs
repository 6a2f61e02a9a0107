// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod job_store;
pub mod notification_sink;
pub mod sender;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use job_store::JobStore;
pub use notification_sink::{NotificationSink, NotifyError};
pub use sender::{OutgoingEmail, SendError, Sender};
pub use time_provider::TimeProvider;
