// Daemon configuration from environment variables

use mailqueue_core::application::QueueConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.mailqueue/queue.db";
const DEFAULT_SPOOL_DIR: &str = "~/.mailqueue/outbox";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: PathBuf,
    pub spool_dir: PathBuf,
    pub log_format: LogFormat,
    /// Daily-rotated JSON log files go here when set
    pub log_dir: Option<PathBuf>,
    pub queue: QueueConfig,
    /// Values that were set but could not be parsed; logged after tracing starts
    pub warnings: Vec<String>,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map instead of the process env)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        let mut queue = QueueConfig::default();

        let path = |key: &str, default: &str| {
            let raw = lookup(key).unwrap_or_else(|| default.to_string());
            PathBuf::from(shellexpand::tilde(&raw).into_owned())
        };

        let db_path = path("MAILQUEUE_DB_PATH", DEFAULT_DB_PATH);
        let spool_dir = path("MAILQUEUE_SPOOL_DIR", DEFAULT_SPOOL_DIR);
        let log_dir = lookup("MAILQUEUE_LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(|raw| PathBuf::from(shellexpand::tilde(&raw).into_owned()));

        let log_format = match lookup("MAILQUEUE_LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                warnings.push(format!(
                    "MAILQUEUE_LOG_FORMAT={} is not 'pretty' or 'json', using pretty",
                    other
                ));
                LogFormat::Pretty
            }
        };

        if let Some(n) = parse(&lookup, "MAILQUEUE_BATCH_SIZE", &mut warnings) {
            queue.batch_size = n;
        }
        if let Some(secs) = parse(&lookup, "MAILQUEUE_POLL_INTERVAL_SECS", &mut warnings) {
            queue.poll_interval = Duration::from_secs(secs);
        }
        if let Some(n) = parse(&lookup, "MAILQUEUE_MAX_RETRIES", &mut warnings) {
            queue.max_retries = n;
        }
        if let Some(days) = parse(&lookup, "MAILQUEUE_RETENTION_DAYS", &mut warnings) {
            queue.retention_days = days;
        }
        if let Some(user) = lookup("MAILQUEUE_NOTIFY_USER").filter(|s| !s.trim().is_empty()) {
            queue.default_notify_user = user;
        }

        Self {
            db_path,
            spool_dir,
            log_format,
            log_dir,
            queue,
            warnings,
        }
    }
}

/// Non-negative numeric value; anything else is a warning and the default stays
fn parse<T, F>(lookup: &F, key: &str, warnings: &mut Vec<String>) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if value >= T::default() => Some(value),
        _ => {
            warnings.push(format!("{}={} is invalid, using default", key, raw));
            None
        }
    }
}
