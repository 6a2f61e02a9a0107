// Mailqueue Infrastructure - Local Adapters
// Implements: Sender (spool directory), NotificationSink (tracing decorator)

pub mod spool_sender;
pub mod tracing_sink;

pub use spool_sender::SpoolSender;
pub use tracing_sink::TracingNotificationSink;
