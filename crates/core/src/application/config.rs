// Queue configuration

use crate::application::dispatcher::constants::*;
use crate::domain::DEFAULT_MAX_RETRIES;
use std::time::Duration;

/// Tunables for the delivery queue. `Default` yields the production constants.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Jobs taken per dispatch cycle
    pub batch_size: usize,
    /// Time between dispatch cycles
    pub poll_interval: Duration,
    /// Delay before the first cycle after startup
    pub startup_delay: Duration,
    /// Retry budget stamped on new jobs
    pub max_retries: i32,
    /// Backoff delay indexed by `current_retries` (last entry repeats)
    pub backoff_schedule_ms: Vec<i64>,
    /// Retention window for sent / failed / cancelled jobs
    pub retention_days: i64,
    pub maintenance_interval: Duration,
    /// `processing` jobs older than this are considered orphaned on startup
    pub recovery_window_ms: i64,
    /// Notification recipient when a job carries no `user_id` metadata
    pub default_notify_user: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            startup_delay: DEFAULT_STARTUP_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_schedule_ms: DEFAULT_BACKOFF_SCHEDULE_MS.to_vec(),
            retention_days: DEFAULT_RETENTION_DAYS,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            recovery_window_ms: DEFAULT_RECOVERY_WINDOW_MS,
            default_notify_user: DEFAULT_NOTIFY_USER.to_string(),
        }
    }
}
