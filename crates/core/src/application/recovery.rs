// Crash recovery: requeue jobs left in `processing` by a previous run
use crate::domain::{EmailJob, JobStatus};
use crate::error::Result;
use crate::port::{JobStore, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

/// Startup recovery service
///
/// A job is only `processing` while a dispatch cycle holds it. If the process died
/// mid-send the record stays there forever, invisible to `list_eligible`.
/// On startup, and on every maintenance pass, each `processing` job that started
/// before `now - recovery_window` goes back to `pending` without consuming a retry.
/// Jobs carrying a cancel request are cancelled instead.
pub struct RecoveryService {
    store: Arc<dyn JobStore>,
    time_provider: Arc<dyn TimeProvider>,
    recovery_window_ms: i64,
}

impl RecoveryService {
    /// # Arguments
    /// * `store` - Job store
    /// * `time_provider` - Time provider
    /// * `recovery_window_ms` - Minimum age of a `processing` job before it is considered orphaned
    pub fn new(
        store: Arc<dyn JobStore>,
        time_provider: Arc<dyn TimeProvider>,
        recovery_window_ms: i64,
    ) -> Self {
        Self {
            store,
            time_provider,
            recovery_window_ms,
        }
    }

    /// Requeue orphaned `processing` jobs
    ///
    /// # Returns
    /// Number of jobs recovered
    pub async fn recover_stuck_jobs(&self) -> Result<usize> {
        let now = self.time_provider.now_millis();
        let cutoff = now - self.recovery_window_ms;

        info!(
            cutoff = %cutoff,
            recovery_window_ms = %self.recovery_window_ms,
            "Starting stuck job recovery"
        );

        let processing = self.store.find_by_status(JobStatus::Processing).await?;
        let mut recovered = 0;

        for job in processing {
            // processed_at holds the send start time while processing
            let started_at = job.processed_at.unwrap_or(job.created_at);
            if started_at >= cutoff {
                continue;
            }
            let settled = if job.cancel_requested {
                self.close_cancelled(job, now).await?
            } else {
                self.requeue(job).await?
            };
            if settled {
                recovered += 1;
            }
        }

        info!(recovered = %recovered, "Stuck job recovery complete");
        Ok(recovered)
    }

    async fn requeue(&self, mut job: EmailJob) -> Result<bool> {
        job.release()?;
        job.processed_at = None;

        let applied = self.store.transition(&job, JobStatus::Processing).await?;
        if applied {
            warn!(
                job_id = %job.id,
                current_retries = job.current_retries,
                "Orphaned job requeued, it may be delivered twice"
            );
        }
        Ok(applied)
    }

    /// A cancel was requested before the send outcome was recorded: do not resend
    async fn close_cancelled(&self, mut job: EmailJob, now: i64) -> Result<bool> {
        job.fail(now, "Cancelled while the send was unconfirmed")?;
        if !self.store.transition(&job, JobStatus::Processing).await? {
            return Ok(false);
        }
        let cancelled = self.store.cancel(&job.id).await?;
        if cancelled {
            info!(job_id = %job.id, "Orphaned job had a cancel request, cancelled");
        }
        Ok(cancelled)
    }
}
