// Tracing NotificationSink decorator
use async_trait::async_trait;
use mailqueue_core::domain::{Notification, NotificationLevel};
use mailqueue_core::port::{NotificationSink, NotifyError};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Logs every notification at its level, then hands it to the wrapped sink (if any)
pub struct TracingNotificationSink {
    inner: Option<Arc<dyn NotificationSink>>,
}

impl TracingNotificationSink {
    /// Log only
    pub fn new() -> Self {
        Self { inner: None }
    }

    /// Log, then forward to `inner`
    pub fn wrap(inner: Arc<dyn NotificationSink>) -> Self {
        Self { inner: Some(inner) }
    }
}

impl Default for TracingNotificationSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn publish(&self, user_id: &str, notification: Notification) -> Result<(), NotifyError> {
        match notification.level {
            NotificationLevel::Info => info!(
                user_id = %user_id,
                kind = %notification.kind,
                body = %notification.message,
                "{}", notification.title
            ),
            NotificationLevel::Warning => warn!(
                user_id = %user_id,
                kind = %notification.kind,
                body = %notification.message,
                "{}", notification.title
            ),
            NotificationLevel::Error => error!(
                user_id = %user_id,
                kind = %notification.kind,
                body = %notification.message,
                "{}", notification.title
            ),
        }

        match &self.inner {
            Some(inner) => inner.publish(user_id, notification).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailqueue_core::domain::NotificationType;
    use mailqueue_core::port::notification_sink::mocks::RecordingSink;

    fn notification() -> Notification {
        Notification {
            kind: NotificationType::RetryScheduled,
            title: "Email delivery delayed".to_string(),
            message: "Retry 1/3 in 60s.".to_string(),
            level: NotificationLevel::Warning,
        }
    }

    #[tokio::test]
    async fn test_forwards_to_inner() {
        let inner = Arc::new(RecordingSink::new());
        let sink = TracingNotificationSink::wrap(inner.clone());

        sink.publish("owner", notification()).await.unwrap();

        let published = inner.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "owner");
    }

    #[tokio::test]
    async fn test_inner_failure_propagates() {
        let sink = TracingNotificationSink::wrap(Arc::new(RecordingSink::failing()));
        assert!(sink.publish("owner", notification()).await.is_err());
    }

    #[tokio::test]
    async fn test_log_only() {
        let sink = TracingNotificationSink::new();
        assert!(sink.publish("owner", notification()).await.is_ok());
    }
}
