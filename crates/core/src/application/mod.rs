// Application Layer - Use Cases and Business Logic

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod email_queue;
pub mod maintenance;
pub mod notifier;
pub mod recovery;
pub mod retry;
pub mod stats;

// Re-exports
pub use classifier::{ClassifiedError, ErrorClassifier};
pub use config::QueueConfig;
pub use dispatcher::{
    shutdown_channel, CycleReport, Dispatcher, JobOutcome, ShutdownSender, ShutdownToken,
};
pub use email_queue::{EmailQueue, EnqueueEmailRequest};
pub use maintenance::MaintenanceScheduler;
pub use notifier::NotificationEmitter;
pub use recovery::RecoveryService;
pub use retry::{RetryDecision, RetryPlanner};
pub use stats::StatsAggregator;
