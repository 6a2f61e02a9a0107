// Maintenance Service
// Scheduled retention cleanup for terminal jobs

use crate::application::dispatcher::ShutdownToken;
use crate::application::email_queue::EmailQueue;
use crate::application::recovery::RecoveryService;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Maintenance scheduler
///
/// Deletes sent / failed / cancelled jobs past the retention window on a fixed interval.
/// With a recovery service attached, each pass also requeues jobs stranded in
/// `processing` (e.g. a store error after the claim).
pub struct MaintenanceScheduler {
    queue: Arc<EmailQueue>,
    recovery: Option<Arc<RecoveryService>>,
    retention_days: i64,
    interval: Duration,
}

impl MaintenanceScheduler {
    /// # Arguments
    /// * `queue` - Queue facade that owns the cleanup operation
    /// * `retention_days` - How long terminal jobs are kept
    /// * `interval` - How often cleanup runs
    pub fn new(queue: Arc<EmailQueue>, retention_days: i64, interval: Duration) -> Self {
        Self {
            queue,
            recovery: None,
            retention_days,
            interval,
        }
    }

    pub fn with_recovery(mut self, recovery: Arc<RecoveryService>) -> Self {
        self.recovery = Some(recovery);
        self
    }

    /// Run the maintenance loop until shutdown. The first cleanup runs immediately.
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            retention_days = self.retention_days,
            "Maintenance scheduler started"
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {},
                _ = shutdown.wait() => break,
            }

            if let Err(e) = self.run_now().await {
                error!(error = ?e, "Scheduled maintenance failed");
            }
        }

        info!("Maintenance scheduler stopped");
    }

    /// Run cleanup immediately (for manual trigger)
    pub async fn run_now(&self) -> Result<u64> {
        if let Some(recovery) = &self.recovery {
            match recovery.recover_stuck_jobs().await {
                Ok(0) => {}
                Ok(recovered) => warn!(recovered, "Stranded jobs recovered during maintenance"),
                Err(e) => error!(error = ?e, "Stranded job recovery failed"),
            }
        }

        let deleted = self.queue.cleanup_old_jobs(self.retention_days).await?;
        info!(deleted, "Maintenance completed");
        Ok(deleted)
    }
}
