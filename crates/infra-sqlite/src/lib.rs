// Mailqueue Infrastructure - SQLite Adapter
// Implements: JobStore, NotificationSink

mod connection;
mod error;
mod job_store;
mod migration;
mod notification_sink;

pub use connection::create_pool;
pub use job_store::SqliteJobStore;
pub use migration::run_migrations;
pub use notification_sink::{SqliteNotificationSink, StoredNotification};
