// Email Queue Service - manual operations on the delivery queue

pub mod enqueue;

#[cfg(test)]
mod enqueue_test;

pub use enqueue::{validate_request, EnqueueEmailRequest};

use crate::application::config::QueueConfig;
use crate::application::dispatcher::constants::MILLIS_PER_DAY;
use crate::application::stats::StatsAggregator;
use crate::domain::{EmailJob, JobId, JobStatus, QueueStats};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobStore, TimeProvider};
use std::sync::Arc;
use tracing::{debug, info};

/// Entry point for everything outside the dispatch loop:
/// enqueue, inspect, cancel, manual retry, stats, retention cleanup.
pub struct EmailQueue {
    store: Arc<dyn JobStore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    stats: StatsAggregator,
    max_retries: i32,
}

impl EmailQueue {
    pub fn new(
        store: Arc<dyn JobStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        config: &QueueConfig,
    ) -> Self {
        Self {
            stats: StatsAggregator::new(store.clone()),
            store,
            id_provider,
            time_provider,
            max_retries: config.max_retries,
        }
    }

    /// Validate and persist a new pending job
    pub async fn add_email(&self, req: EnqueueEmailRequest) -> Result<JobId> {
        enqueue::execute(
            self.store.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            self.max_retries,
            req,
        )
        .await
    }

    pub async fn get_job(&self, id: &str) -> Result<Option<EmailJob>> {
        self.store.find_by_id(id).await
    }

    /// Cancel a pending or failed job.
    ///
    /// A job mid-send is flagged instead: the send is not aborted, but if it fails
    /// the job ends `cancelled` rather than being rescheduled. Already sent or
    /// cancelled jobs are left alone (Ok); an unknown id is `JobNotFound`.
    pub async fn cancel_job(&self, id: &str) -> Result<()> {
        if self.store.cancel(id).await? {
            info!(job_id = %id, "Job cancelled");
            return Ok(());
        }
        if self.store.request_cancel(id).await? {
            info!(job_id = %id, "Cancel requested, job is mid-send");
            return Ok(());
        }

        match self.store.find_by_id(id).await? {
            None => Err(AppError::JobNotFound(id.to_string())),
            Some(job) if job.status.is_final() => {
                debug!(job_id = %id, status = %job.status, "Cancel ignored, job already final");
                Ok(())
            }
            // moved between pending and processing under us
            Some(job) => Err(AppError::InvalidState(format!(
                "Job {} changed while being cancelled (now {})",
                id, job.status
            ))),
        }
    }

    /// Put a failed job back in the queue with a fresh retry budget, due now
    pub async fn retry_job(&self, id: &str) -> Result<()> {
        let mut job = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::JobNotFound(id.to_string()))?;

        if job.status != JobStatus::Failed {
            return Err(AppError::InvalidState(format!(
                "Only failed jobs can be retried (job {} is {})",
                id, job.status
            )));
        }

        job.reset_for_retry(self.time_provider.now_millis())?;

        if !self.store.transition(&job, JobStatus::Failed).await? {
            return Err(AppError::InvalidState(format!(
                "Job {} changed while being retried",
                id
            )));
        }

        info!(job_id = %id, "Job requeued manually");
        Ok(())
    }

    pub async fn get_queue_stats(&self) -> Result<QueueStats> {
        self.stats.queue_stats().await
    }

    /// Delete sent / failed / cancelled jobs older than `retention_days`.
    /// Pending and processing jobs are never touched.
    pub async fn cleanup_old_jobs(&self, retention_days: i64) -> Result<u64> {
        if retention_days < 0 {
            return Err(AppError::Validation(format!(
                "Retention days must be non-negative, got {}",
                retention_days
            )));
        }

        let cutoff = retention_days
            .checked_mul(MILLIS_PER_DAY)
            .and_then(|window| self.time_provider.now_millis().checked_sub(window))
            .ok_or_else(|| {
                AppError::Validation(format!("Retention of {} days is too large", retention_days))
            })?;
        let deleted = self.store.purge(cutoff).await?;

        info!(retention_days, cutoff, deleted, "Old jobs cleaned up");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::job_store::mocks::InMemoryJobStore;
    use crate::port::time_provider::mocks::MockTimeProvider;

    const NOW: i64 = 1_700_000_000_000;

    fn queue() -> (EmailQueue, Arc<InMemoryJobStore>) {
        let store = Arc::new(InMemoryJobStore::new());
        let queue = EmailQueue::new(
            store.clone(),
            Arc::new(SequentialIdProvider::default()),
            Arc::new(MockTimeProvider::new(NOW)),
            &QueueConfig::default(),
        );
        (queue, store)
    }

    fn stored(id: &str, status: JobStatus, created_at: i64) -> EmailJob {
        let mut job = EmailJob::new(id, created_at, "a@example.com", "s", "c");
        job.status = status;
        job
    }

    #[tokio::test]
    async fn test_add_email_creates_pending_job() {
        let (queue, store) = queue();
        let mut req = EnqueueEmailRequest::new(" client@example.com ", "Reminder", "Body");
        req.priority = crate::domain::Priority::High;
        req.metadata = Some(serde_json::json!({"invoice_id": "inv-1"}));

        let id = queue.add_email(req).await.unwrap();
        assert_eq!(id, "job-1");

        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.recipient, "client@example.com");
        assert_eq!(job.created_at, NOW);
        assert_eq!(job.current_retries, 0);
        assert_eq!(job.max_retries, 3);
        assert_eq!(
            job.metadata.unwrap().get_str("invoice_id"),
            Some("inv-1")
        );
    }

    #[tokio::test]
    async fn test_add_email_rejects_invalid() {
        let (queue, store) = queue();
        let result = queue
            .add_email(EnqueueEmailRequest::new("not-an-address", "s", "c"))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_pending_and_failed() {
        let (queue, store) = queue();
        store.put(stored("p", JobStatus::Pending, NOW));
        store.put(stored("f", JobStatus::Failed, NOW));

        queue.cancel_job("p").await.unwrap();
        queue.cancel_job("f").await.unwrap();

        assert_eq!(store.get("p").unwrap().status, JobStatus::Cancelled);
        assert_eq!(store.get("f").unwrap().status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_sent_is_noop() {
        let (queue, store) = queue();
        store.put(stored("s", JobStatus::Sent, NOW));

        queue.cancel_job("s").await.unwrap();
        assert_eq!(store.get("s").unwrap().status, JobStatus::Sent);
    }

    #[tokio::test]
    async fn test_cancel_processing_sets_flag() {
        let (queue, store) = queue();
        store.put(stored("x", JobStatus::Processing, NOW));

        queue.cancel_job("x").await.unwrap();
        let job = store.get("x").unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.cancel_requested);

        // repeated request is fine
        queue.cancel_job("x").await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_unknown_job() {
        let (queue, _) = queue();
        assert!(matches!(
            queue.cancel_job("missing").await,
            Err(AppError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_retry_failed_job_resets_budget() {
        let (queue, store) = queue();
        let mut failed = stored("f", JobStatus::Failed, NOW - 10_000);
        failed.current_retries = 3;
        failed.error_message = Some("[server] 503".to_string());
        store.put(failed);

        queue.retry_job("f").await.unwrap();

        let job = store.get("f").unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.current_retries, 0);
        assert_eq!(job.scheduled_at, Some(NOW));
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn test_retry_requires_failed() {
        let (queue, store) = queue();
        store.put(stored("s", JobStatus::Sent, NOW));

        assert!(matches!(
            queue.retry_job("s").await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            queue.retry_job("missing").await,
            Err(AppError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_respects_retention_and_status() {
        let (queue, store) = queue();
        let ten_days_ago = NOW - 10 * MILLIS_PER_DAY;
        let thirty_days_ago = NOW - 30 * MILLIS_PER_DAY;

        let mut old_sent = stored("old-sent", JobStatus::Sent, ten_days_ago);
        old_sent.processed_at = Some(ten_days_ago);
        store.put(old_sent);
        store.put(stored("old-pending", JobStatus::Pending, thirty_days_ago));
        let mut recent = stored("recent-failed", JobStatus::Failed, NOW - MILLIS_PER_DAY);
        recent.processed_at = Some(NOW - MILLIS_PER_DAY);
        store.put(recent);

        let deleted = queue.cleanup_old_jobs(7).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.get("old-sent").is_none());
        assert!(store.get("old-pending").is_some());
        assert!(store.get("recent-failed").is_some());
    }

    #[tokio::test]
    async fn test_cleanup_rejects_negative_retention() {
        let (queue, _) = queue();
        assert!(matches!(
            queue.cleanup_old_jobs(-1).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_rejects_overflowing_retention() {
        let (queue, store) = queue();
        let mut sent = stored("s", JobStatus::Sent, NOW);
        sent.processed_at = Some(NOW);
        store.put(sent);

        for days in [i64::MAX, i64::MAX / 1_000] {
            assert!(matches!(
                queue.cleanup_old_jobs(days).await,
                Err(AppError::Validation(_))
            ));
        }
        assert!(store.get("s").is_some());
    }

    #[tokio::test]
    async fn test_queue_stats() {
        let (queue, store) = queue();
        store.put(stored("a", JobStatus::Pending, NOW));
        store.put(stored("b", JobStatus::Pending, NOW));
        store.put(stored("c", JobStatus::Sent, NOW));
        store.put(stored("d", JobStatus::Cancelled, NOW));

        let stats = queue.get_queue_stats().await.unwrap();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.total, 4);
    }
}
