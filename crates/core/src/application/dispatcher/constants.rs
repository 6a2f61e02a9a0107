// Dispatcher constants (No magic values)
use std::time::Duration;

/// Jobs processed per dispatch cycle
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Interval between dispatch cycles (30s)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// First cycle runs shortly after startup (2s)
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(2);

/// Retry delays indexed by attempt: 1 min, 5 min, 15 min
pub const DEFAULT_BACKOFF_SCHEDULE_MS: [i64; 3] = [60_000, 300_000, 900_000];

/// Keep terminal jobs for 7 days
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Run retention cleanup once a day
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Orphaned `processing` jobs older than 5 minutes are requeued on startup
pub const DEFAULT_RECOVERY_WINDOW_MS: i64 = 5 * 60 * 1000;

pub const DEFAULT_NOTIFY_USER: &str = "owner";

pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;
