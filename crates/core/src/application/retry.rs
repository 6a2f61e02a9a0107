// Retry planning
use crate::application::classifier::ClassifiedError;
use crate::application::dispatcher::constants::DEFAULT_BACKOFF_SCHEDULE_MS;
use crate::domain::EmailJob;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the job (with backoff delay in ms)
    Retry(i64),
    /// Do not retry, job has failed permanently
    Failed,
}

/// Fixed backoff schedule indexed by `current_retries`.
///
/// Attempt 0 -> 60s, 1 -> 300s, 2 -> 900s by default; indices past the end
/// reuse the last entry. A classified delay floor (quota) raises the delay,
/// never lowers it below the schedule.
///
/// `current_retries` counts retryable failures: the failure that brings it to
/// `max_retries` is terminal, so a job with `max_retries = 3` is sent at most 3 times.
pub struct RetryPlanner {
    schedule_ms: Vec<i64>,
}

impl Default for RetryPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_SCHEDULE_MS.to_vec())
    }
}

impl RetryPlanner {
    /// # Arguments
    /// * `schedule_ms` - Backoff delays; an empty schedule retries immediately
    pub fn new(schedule_ms: Vec<i64>) -> Self {
        Self { schedule_ms }
    }

    /// Scheduled delay for a given attempt index
    pub fn delay_for_attempt(&self, attempt: i32) -> i64 {
        let idx = attempt.max(0) as usize;
        self.schedule_ms
            .get(idx)
            .or_else(|| self.schedule_ms.last())
            .copied()
            .unwrap_or(0)
    }

    /// Decide what happens after a failed attempt
    ///
    /// Returns:
    /// - `RetryDecision::Retry(delay_ms)` if the error is retryable and this failure
    ///   leaves budget
    /// - `RetryDecision::Failed` otherwise
    pub fn plan(&self, job: &EmailJob, error: &ClassifiedError) -> RetryDecision {
        if !error.retryable {
            warn!(
                job_id = %job.id,
                kind = %error.kind,
                "Non-retryable failure"
            );
            return RetryDecision::Failed;
        }

        if !job.can_retry() {
            warn!(
                job_id = %job.id,
                failures = %(job.current_retries + 1),
                max_retries = %job.max_retries,
                "Max retry attempts reached"
            );
            return RetryDecision::Failed;
        }

        let scheduled = self.delay_for_attempt(job.current_retries);
        let delay_ms = error
            .delay_floor_ms
            .map_or(scheduled, |floor| scheduled.max(floor));

        info!(
            job_id = %job.id,
            attempt = %job.current_retries,
            max_retries = %job.max_retries,
            kind = %error.kind,
            delay_ms = %delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay_ms)
    }
}
