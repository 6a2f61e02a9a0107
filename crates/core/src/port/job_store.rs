// Job Store Port (Interface)

use crate::domain::{EmailJob, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Durable record of job state; single source of truth for status transitions.
///
/// Every mutation is a compare-and-set keyed by job id, so a cancel racing the
/// dispatch loop on the same job resolves deterministically: whichever write
/// lands first wins, the other observes `false`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &EmailJob) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &str) -> Result<Option<EmailJob>>;

    /// Pending jobs due at `now_millis`, in dispatch order, at most `limit`
    async fn list_eligible(&self, now_millis: i64, limit: usize) -> Result<Vec<EmailJob>>;

    /// Persist the mutable fields of `job` if the stored status is still `expected`
    /// and the stored `cancel_requested` flag equals `job.cancel_requested`.
    ///
    /// Returns `false` (and writes nothing) if the job is missing, its status moved on,
    /// a cancel request landed since `job` was read, or `expected` is a final status.
    /// Moving out of `processing` clears `cancel_requested`.
    async fn transition(&self, job: &EmailJob, expected: JobStatus) -> Result<bool>;

    /// pending | failed -> cancelled. Returns `false` if the job was in any other status.
    async fn cancel(&self, id: &str) -> Result<bool>;

    /// Set `cancel_requested` on a `processing` job. Returns `false` in any other status.
    async fn request_cancel(&self, id: &str) -> Result<bool>;

    /// Delete sent / failed / cancelled jobs whose reference time
    /// (`processed_at`, else `scheduled_at`, else `created_at`) is before `cutoff_millis`
    async fn purge(&self, cutoff_millis: i64) -> Result<u64>;

    /// Count jobs grouped by status (statuses with no jobs may be omitted)
    async fn count_by_status(&self) -> Result<Vec<(JobStatus, i64)>>;

    /// Find all jobs in a status (for recovery)
    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<EmailJob>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::dispatch_order;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store with the same compare-and-set semantics as the SQLite store
    #[derive(Default)]
    pub struct InMemoryJobStore {
        jobs: Mutex<HashMap<String, EmailJob>>,
    }

    impl InMemoryJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Snapshot of a job, bypassing the async interface
        pub fn get(&self, id: &str) -> Option<EmailJob> {
            self.jobs.lock().unwrap().get(id).cloned()
        }

        /// Overwrite a job unconditionally (test setup)
        pub fn put(&self, job: EmailJob) {
            self.jobs.lock().unwrap().insert(job.id.clone(), job);
        }

        pub fn len(&self) -> usize {
            self.jobs.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn insert(&self, job: &EmailJob) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.contains_key(&job.id) {
                return Err(AppError::Database(format!(
                    "Unique constraint violation: {}",
                    job.id
                )));
            }
            jobs.insert(job.id.clone(), job.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<EmailJob>> {
            Ok(self.get(id))
        }

        async fn list_eligible(&self, now_millis: i64, limit: usize) -> Result<Vec<EmailJob>> {
            let mut eligible: Vec<EmailJob> = self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.is_eligible(now_millis))
                .cloned()
                .collect();
            eligible.sort_by(dispatch_order);
            eligible.truncate(limit);
            Ok(eligible)
        }

        async fn transition(&self, job: &EmailJob, expected: JobStatus) -> Result<bool> {
            if expected.is_final() {
                return Ok(false);
            }
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(&job.id) {
                Some(stored)
                    if stored.status == expected
                        && stored.cancel_requested == job.cancel_requested =>
                {
                    stored.status = job.status;
                    stored.cancel_requested &= job.status == JobStatus::Processing;
                    stored.current_retries = job.current_retries;
                    stored.scheduled_at = job.scheduled_at;
                    stored.processed_at = job.processed_at;
                    stored.error_message = job.error_message.clone();
                    stored.message_id = job.message_id.clone();
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn cancel(&self, id: &str) -> Result<bool> {
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(id) {
                Some(stored) => Ok(stored.cancel().is_ok()),
                None => Ok(false),
            }
        }

        async fn request_cancel(&self, id: &str) -> Result<bool> {
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(id) {
                Some(stored) => Ok(stored.request_cancel().is_ok()),
                None => Ok(false),
            }
        }

        async fn purge(&self, cutoff_millis: i64) -> Result<u64> {
            let mut jobs = self.jobs.lock().unwrap();
            let before = jobs.len();
            jobs.retain(|_, j| {
                let reference = j.processed_at.or(j.scheduled_at).unwrap_or(j.created_at);
                !(j.status.is_purgeable() && reference < cutoff_millis)
            });
            Ok((before - jobs.len()) as u64)
        }

        async fn count_by_status(&self) -> Result<Vec<(JobStatus, i64)>> {
            let jobs = self.jobs.lock().unwrap();
            Ok(JobStatus::ALL
                .iter()
                .map(|s| (*s, jobs.values().filter(|j| j.status == *s).count() as i64))
                .collect())
        }

        async fn find_by_status(&self, status: JobStatus) -> Result<Vec<EmailJob>> {
            let mut found: Vec<EmailJob> = self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.status == status)
                .cloned()
                .collect();
            found.sort_by_key(|j| j.created_at);
            Ok(found)
        }
    }
}
