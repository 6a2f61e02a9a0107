// Notification emitter: reports delivery outcomes to the user
use crate::application::classifier::ClassifiedError;
use crate::domain::{EmailJob, Notification, NotificationLevel, NotificationType};
use crate::port::NotificationSink;
use std::sync::Arc;
use tracing::{error, warn};

/// Metadata key naming the user who should hear about a job
pub const USER_ID_METADATA_KEY: &str = "user_id";

pub struct NotificationEmitter {
    sink: Arc<dyn NotificationSink>,
    default_user: String,
}

impl NotificationEmitter {
    pub fn new(sink: Arc<dyn NotificationSink>, default_user: impl Into<String>) -> Self {
        Self {
            sink,
            default_user: default_user.into(),
        }
    }

    pub async fn sent(&self, job: &EmailJob) {
        self.publish(
            job,
            Notification {
                kind: NotificationType::EmailSent,
                title: "Email sent".to_string(),
                message: format!("\"{}\" was delivered to {}", job.subject, job.recipient),
                level: NotificationLevel::Info,
            },
        )
        .await;
    }

    pub async fn retry_scheduled(&self, job: &EmailJob, delay_ms: i64, err: &ClassifiedError) {
        self.publish(
            job,
            Notification {
                kind: NotificationType::RetryScheduled,
                title: "Email delivery delayed".to_string(),
                message: format!(
                    "Sending to {} failed ({}). Retry {}/{} in {}s.",
                    job.recipient,
                    err.kind,
                    job.current_retries,
                    job.max_retries,
                    delay_ms / 1000
                ),
                level: NotificationLevel::Warning,
            },
        )
        .await;

        // quota is retryable but still needs the user's attention
        if err.kind.escalates() {
            self.escalate(job, err).await;
        }
    }

    /// Terminal failure; authentication and quota failures also escalate
    pub async fn failed(&self, job: &EmailJob, err: &ClassifiedError) {
        self.publish(
            job,
            Notification {
                kind: NotificationType::EmailFailed,
                title: "Email could not be sent".to_string(),
                message: format!("Sending to {} failed: {}", job.recipient, err.message),
                level: NotificationLevel::Error,
            },
        )
        .await;

        if err.kind.escalates() {
            self.escalate(job, err).await;
        }
    }

    pub(crate) async fn escalate(&self, job: &EmailJob, err: &ClassifiedError) {
        error!(
            escalation = true,
            job_id = %job.id,
            kind = %err.kind,
            error = %err.message,
            "Delivery escalation"
        );

        let message = match err.kind {
            crate::domain::ErrorKind::Authentication => {
                "Email account authorization expired. Reconnect the account to resume sending."
                    .to_string()
            }
            _ => format!(
                "Email provider limit reached ({}). Pending emails will wait until the limit resets.",
                err.kind
            ),
        };

        self.publish(
            job,
            Notification {
                kind: NotificationType::Escalation,
                title: "Email delivery needs attention".to_string(),
                message,
                level: NotificationLevel::Error,
            },
        )
        .await;
    }

    async fn publish(&self, job: &EmailJob, notification: Notification) {
        let user_id = job
            .metadata
            .as_ref()
            .and_then(|m| m.get_str(USER_ID_METADATA_KEY))
            .unwrap_or(self.default_user.as_str());

        if let Err(e) = self.sink.publish(user_id, notification).await {
            warn!(job_id = %job.id, error = %e, "Dropping notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::classifier::ErrorClassifier;
    use crate::domain::{ErrorKind, JobMetadata};
    use crate::port::notification_sink::mocks::RecordingSink;
    use crate::port::SendError;

    fn classified(kind: ErrorKind) -> ClassifiedError {
        ErrorClassifier::new().classify(&SendError::with_kind(kind, "boom"))
    }

    fn job() -> EmailJob {
        EmailJob::new("job-1", 0, "a@example.com", "Invoice due", "body")
    }

    #[tokio::test]
    async fn test_routes_to_metadata_user() {
        let sink = Arc::new(RecordingSink::new());
        let emitter = NotificationEmitter::new(sink.clone(), "owner");

        let mut tagged = job();
        tagged.metadata = Some(JobMetadata::new(
            serde_json::json!({"user_id": "u-42", "invoice_id": "inv-7"}),
        ));
        emitter.sent(&tagged).await;
        emitter.sent(&job()).await;

        let published = sink.published();
        assert_eq!(published[0].0, "u-42");
        assert_eq!(published[1].0, "owner");
        assert_eq!(published[0].1.kind, NotificationType::EmailSent);
    }

    #[tokio::test]
    async fn test_escalation_only_for_auth_and_quota() {
        let sink = Arc::new(RecordingSink::new());
        let emitter = NotificationEmitter::new(sink.clone(), "owner");

        emitter.failed(&job(), &classified(ErrorKind::Validation)).await;
        assert_eq!(sink.notifications().len(), 1);

        emitter.failed(&job(), &classified(ErrorKind::Authentication)).await;
        emitter.failed(&job(), &classified(ErrorKind::Quota)).await;

        let kinds: Vec<_> = sink.notifications().iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationType::EmailFailed,
                NotificationType::EmailFailed,
                NotificationType::Escalation,
                NotificationType::EmailFailed,
                NotificationType::Escalation,
            ]
        );
    }

    #[tokio::test]
    async fn test_quota_retry_also_escalates() {
        let sink = Arc::new(RecordingSink::new());
        let emitter = NotificationEmitter::new(sink.clone(), "owner");

        emitter
            .retry_scheduled(&job(), 300_000, &classified(ErrorKind::Quota))
            .await;
        emitter
            .retry_scheduled(&job(), 60_000, &classified(ErrorKind::Network))
            .await;

        let kinds: Vec<_> = sink.notifications().iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationType::RetryScheduled,
                NotificationType::Escalation,
                NotificationType::RetryScheduled,
            ]
        );
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let emitter = NotificationEmitter::new(Arc::new(RecordingSink::failing()), "owner");
        // must not panic or propagate
        emitter.failed(&job(), &classified(ErrorKind::Authentication)).await;
    }
}
