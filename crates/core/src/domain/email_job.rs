// Email Job Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Job ID (UUID v4)
pub type JobId = String;

/// Default retry budget for a new job
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Delivery priority. Declaration order is rank order (`High` dispatches first).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    /// Numeric rank stored in the database (higher = dispatched earlier)
    pub fn rank(self) -> i32 {
        match self {
            Priority::Low => 0,
            Priority::Normal => 1,
            Priority::High => 2,
        }
    }

    pub fn from_rank(rank: i32) -> Option<Self> {
        match rank {
            0 => Some(Priority::Low),
            1 => Some(Priority::Normal),
            2 => Some(Priority::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(DomainError::InvalidPriority(other.to_string())),
        }
    }
}

/// Job lifecycle status
///
/// ```text
/// pending -> processing -> sent
///    ^           |
///    +-----------+ (retry scheduled / deferred)
///                |
///                v
///             failed -> pending (manual retry)
/// pending | failed -> cancelled
/// processing + cancel_requested -> (send fails) -> failed -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Sent,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Sent,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// No further transition is possible from this status
    pub fn is_final(self) -> bool {
        matches!(self, JobStatus::Sent | JobStatus::Cancelled)
    }

    /// Eligible for retention cleanup
    pub fn is_purgeable(self) -> bool {
        matches!(self, JobStatus::Sent | JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Sent => write!(f, "sent"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "sent" => Ok(JobStatus::Sent),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(DomainError::InvalidStatus(other.to_string())),
        }
    }
}

/// Opaque correlation fields (invoice / client / template ids).
/// Carried through untouched; the queue never interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata(serde_json::Value);

impl JobMetadata {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }
}

/// Email Job Entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailJob {
    pub id: JobId,
    pub recipient: String,
    pub subject: String,
    pub content: String,
    pub priority: Priority,
    pub status: JobStatus,
    /// Cancel asked for while the job was `processing`; honored once the send returns
    #[serde(default)]
    pub cancel_requested: bool,

    pub max_retries: i32,
    pub current_retries: i32,

    pub created_at: i64,           // epoch ms
    pub scheduled_at: Option<i64>, // not dispatchable before this
    pub processed_at: Option<i64>,

    pub error_message: Option<String>,
    pub message_id: Option<String>, // provider message id once sent
    pub metadata: Option<JobMetadata>,
}

impl EmailJob {
    /// Create a new pending job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            recipient: recipient.into(),
            subject: subject.into(),
            content: content.into(),
            priority: Priority::Normal,
            status: JobStatus::Pending,
            cancel_requested: false,
            max_retries: DEFAULT_MAX_RETRIES,
            current_retries: 0,
            created_at,
            scheduled_at: None,
            processed_at: None,
            error_message: None,
            message_id: None,
            metadata: None,
        }
    }

    /// `scheduled_at` is unset or not in the future
    pub fn is_due(&self, now_millis: i64) -> bool {
        self.scheduled_at.map_or(true, |at| at <= now_millis)
    }

    pub fn is_eligible(&self, now_millis: i64) -> bool {
        self.status == JobStatus::Pending && self.is_due(now_millis)
    }

    /// One more failure would still leave the job inside its retry budget
    pub fn can_retry(&self) -> bool {
        self.current_retries + 1 < self.max_retries
    }

    fn invalid(&self, to: JobStatus) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// pending -> processing
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::Pending {
            return Err(self.invalid(JobStatus::Processing));
        }
        self.status = JobStatus::Processing;
        self.processed_at = Some(now_millis);
        Ok(())
    }

    /// processing -> pending without consuming a retry (job was picked up before it was due)
    pub fn release(&mut self) -> Result<()> {
        if self.status != JobStatus::Processing {
            return Err(self.invalid(JobStatus::Pending));
        }
        self.status = JobStatus::Pending;
        Ok(())
    }

    /// processing -> sent
    pub fn mark_sent(&mut self, now_millis: i64, message_id: impl Into<String>) -> Result<()> {
        if self.status != JobStatus::Processing {
            return Err(self.invalid(JobStatus::Sent));
        }
        self.status = JobStatus::Sent;
        self.processed_at = Some(now_millis);
        self.message_id = Some(message_id.into());
        Ok(())
    }

    /// processing -> pending, consuming one retry and pushing `scheduled_at` out by `delay_ms`
    pub fn schedule_retry(
        &mut self,
        now_millis: i64,
        delay_ms: i64,
        error: impl Into<String>,
    ) -> Result<()> {
        if self.status != JobStatus::Processing || !self.can_retry() {
            return Err(self.invalid(JobStatus::Pending));
        }
        self.current_retries += 1;
        self.status = JobStatus::Pending;
        self.scheduled_at = Some(now_millis + delay_ms);
        self.error_message = Some(error.into());
        Ok(())
    }

    /// processing -> failed
    pub fn fail(&mut self, now_millis: i64, error: impl Into<String>) -> Result<()> {
        if self.status != JobStatus::Processing {
            return Err(self.invalid(JobStatus::Failed));
        }
        self.status = JobStatus::Failed;
        self.processed_at = Some(now_millis);
        self.error_message = Some(error.into());
        Ok(())
    }

    /// processing -> failed after a retryable failure used up the budget.
    /// Counts the failure, capped at `max_retries`.
    pub fn exhaust(&mut self, now_millis: i64, error: impl Into<String>) -> Result<()> {
        self.fail(now_millis, error)?;
        self.current_retries = (self.current_retries + 1).min(self.max_retries);
        Ok(())
    }

    /// pending | failed -> cancelled
    pub fn cancel(&mut self) -> Result<()> {
        if !matches!(self.status, JobStatus::Pending | JobStatus::Failed) {
            return Err(self.invalid(JobStatus::Cancelled));
        }
        self.status = JobStatus::Cancelled;
        Ok(())
    }

    /// Flag a `processing` job for cancellation. The in-flight send is not aborted;
    /// a failure then ends the job instead of rescheduling it.
    pub fn request_cancel(&mut self) -> Result<()> {
        if self.status != JobStatus::Processing {
            return Err(self.invalid(JobStatus::Cancelled));
        }
        self.cancel_requested = true;
        Ok(())
    }

    /// failed -> pending, outside the automatic backoff schedule
    pub fn reset_for_retry(&mut self, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::Failed {
            return Err(self.invalid(JobStatus::Pending));
        }
        self.status = JobStatus::Pending;
        self.current_retries = 0;
        self.error_message = None;
        self.scheduled_at = Some(now_millis);
        Ok(())
    }
}

/// Dispatch order: priority descending, then earliest `scheduled_at` (unset first),
/// then oldest `created_at`, then id for a total order.
pub fn dispatch_order(a: &EmailJob, b: &EmailJob) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.scheduled_at.cmp(&b.scheduled_at))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> EmailJob {
        EmailJob::new("job-1", 1_000, "a@example.com", "Reminder", "Invoice #7 is due")
    }

    #[test]
    fn test_new_job_defaults() {
        let job = job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.priority, Priority::Normal);
        assert_eq!(job.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(job.current_retries, 0);
        assert!(job.scheduled_at.is_none());
        assert!(job.processed_at.is_none());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!(Priority::from_rank(Priority::High.rank()), Some(Priority::High));
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_eligibility() {
        let mut job = job();
        assert!(job.is_eligible(0));

        job.scheduled_at = Some(5_000);
        assert!(!job.is_eligible(4_999));
        assert!(job.is_eligible(5_000));

        job.status = JobStatus::Failed;
        assert!(!job.is_eligible(10_000));
    }

    #[test]
    fn test_send_lifecycle() {
        let mut job = job();
        job.start(2_000).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.processed_at, Some(2_000));

        job.mark_sent(3_000, "msg-1").unwrap();
        assert_eq!(job.status, JobStatus::Sent);
        assert_eq!(job.processed_at, Some(3_000));
        assert_eq!(job.message_id.as_deref(), Some("msg-1"));

        // sent is final
        assert!(job.start(4_000).is_err());
        assert!(job.cancel().is_err());
        assert!(job.reset_for_retry(4_000).is_err());
    }

    #[test]
    fn test_schedule_retry_respects_budget() {
        let mut job = job();
        assert_eq!(job.max_retries, 3);

        for attempt in 1..=2 {
            job.start(0).unwrap();
            job.schedule_retry(10_000, 60_000, "timeout").unwrap();
            assert_eq!(job.current_retries, attempt);
            assert_eq!(job.status, JobStatus::Pending);
            assert_eq!(job.scheduled_at, Some(70_000));
        }

        // third failure would reach the budget: must be exhausted instead
        job.start(0).unwrap();
        assert!(job.schedule_retry(10_000, 60_000, "timeout").is_err());
        job.exhaust(10_000, "timeout").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.current_retries, 3);
        assert_eq!(job.processed_at, Some(10_000));
    }

    #[test]
    fn test_exhaust_never_exceeds_budget() {
        let mut job = job();
        job.max_retries = 0;
        job.start(0).unwrap();
        job.exhaust(1, "boom").unwrap();
        assert_eq!(job.current_retries, 0);
    }

    #[test]
    fn test_cancel_only_from_pending_or_failed() {
        let mut pending = job();
        assert!(pending.cancel().is_ok());
        assert_eq!(pending.status, JobStatus::Cancelled);

        let mut processing = job();
        processing.start(0).unwrap();
        assert!(processing.cancel().is_err());

        let mut failed = job();
        failed.start(0).unwrap();
        failed.fail(1, "bad recipient").unwrap();
        assert!(failed.cancel().is_ok());
    }

    #[test]
    fn test_request_cancel_only_while_processing() {
        let mut pending = job();
        assert!(pending.request_cancel().is_err());
        assert!(!pending.cancel_requested);

        let mut processing = job();
        processing.start(0).unwrap();
        processing.request_cancel().unwrap();
        assert!(processing.cancel_requested);
        assert_eq!(processing.status, JobStatus::Processing);

        // a late success still lands
        processing.mark_sent(1, "msg-1").unwrap();
        assert_eq!(processing.status, JobStatus::Sent);
    }

    #[test]
    fn test_reset_for_retry() {
        let mut job = job();
        job.current_retries = 3;
        job.status = JobStatus::Failed;
        job.error_message = Some("exhausted".into());

        job.reset_for_retry(9_000).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.current_retries, 0);
        assert_eq!(job.scheduled_at, Some(9_000));
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_dispatch_order() {
        let mut low = job();
        low.id = "low".into();
        low.priority = Priority::Low;
        let mut high_late = job();
        high_late.id = "high-late".into();
        high_late.priority = Priority::High;
        high_late.scheduled_at = Some(2_000);
        let mut high_unset = job();
        high_unset.id = "high-unset".into();
        high_unset.priority = Priority::High;
        let mut high_early = job();
        high_early.id = "high-early".into();
        high_early.priority = Priority::High;
        high_early.scheduled_at = Some(1_000);

        let mut jobs = vec![low, high_late, high_early, high_unset];
        jobs.sort_by(dispatch_order);
        let ids: Vec<_> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["high-unset", "high-early", "high-late", "low"]);
    }

    #[test]
    fn test_release_keeps_retry_counter() {
        let mut job = job();
        job.current_retries = 1;
        job.start(0).unwrap();
        job.release().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.current_retries, 1);
    }
}
