// Enqueue Use Case

use crate::domain::{EmailJob, JobId, JobMetadata, Priority};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobStore, TimeProvider};
use serde::{Deserialize, Serialize};
use tracing::info;

/// RFC 5322 line length limit
pub const MAX_SUBJECT_LEN: usize = 998;

/// Enqueue request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueEmailRequest {
    pub to: String,
    pub subject: String,
    pub content: String,

    #[serde(default)]
    pub priority: Priority,

    /// Epoch ms; omitted means "send as soon as possible"
    #[serde(default)]
    pub scheduled_at: Option<i64>,

    /// Correlation fields (invoice / client / template ids), must be a JSON object
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl EnqueueEmailRequest {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            content: content.into(),
            priority: Priority::default(),
            scheduled_at: None,
            metadata: None,
        }
    }
}

/// Reject requests that can never be delivered
pub fn validate_request(req: &EnqueueEmailRequest) -> Result<()> {
    validate_recipient(&req.to)?;

    if req.subject.trim().is_empty() {
        return Err(AppError::Validation("Subject cannot be empty".to_string()));
    }
    if req.subject.chars().count() > MAX_SUBJECT_LEN {
        return Err(AppError::Validation(format!(
            "Subject too long (max {} characters)",
            MAX_SUBJECT_LEN
        )));
    }
    if req.content.trim().is_empty() {
        return Err(AppError::Validation("Content cannot be empty".to_string()));
    }
    if let Some(metadata) = &req.metadata {
        if !metadata.is_object() {
            return Err(AppError::Validation(
                "Metadata must be a JSON object".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_recipient(to: &str) -> Result<()> {
    let to = to.trim();
    if to.is_empty() {
        return Err(AppError::Validation("Recipient cannot be empty".to_string()));
    }
    if to.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(format!(
            "Recipient contains whitespace: {}",
            to
        )));
    }
    match to.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(())
        }
        _ => Err(AppError::Validation(format!(
            "Recipient is not a valid email address: {}",
            to
        ))),
    }
}

/// Execute enqueue use case
///
/// # Arguments
///
/// * `store` - Job store
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `max_retries` - Retry budget stamped on the job
/// * `req` - Enqueue request
pub async fn execute(
    store: &dyn JobStore,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    max_retries: i32,
    req: EnqueueEmailRequest,
) -> Result<JobId> {
    validate_request(&req)?;

    let job_id = id_provider.next_id();
    let created_at = time_provider.now_millis();

    let mut job = EmailJob::new(
        job_id.clone(),
        created_at,
        req.to.trim(),
        req.subject,
        req.content,
    );
    job.priority = req.priority;
    job.scheduled_at = req.scheduled_at;
    job.max_retries = max_retries.max(0);
    job.metadata = req.metadata.map(JobMetadata::new);

    store.insert(&job).await?;

    info!(
        job_id = %job.id,
        priority = %job.priority,
        scheduled_at = ?job.scheduled_at,
        "Email enqueued"
    );

    Ok(job_id)
}
