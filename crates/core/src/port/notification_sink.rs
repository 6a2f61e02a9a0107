// Notification Sink Port - user-facing side channel

use crate::domain::Notification;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Notification publish failed: {0}")]
pub struct NotifyError(pub String);

/// Fire-and-forget publisher. Callers log and drop errors; a failed publish
/// never fails the job transition it accompanies.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, user_id: &str, notification: Notification) -> Result<(), NotifyError>;
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Captures published notifications; can be switched to fail every publish
    #[derive(Default)]
    pub struct RecordingSink {
        published: Mutex<Vec<(String, Notification)>>,
        fail: AtomicBool,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            let sink = Self::default();
            sink.fail.store(true, Ordering::SeqCst);
            sink
        }

        pub fn published(&self) -> Vec<(String, Notification)> {
            self.published.lock().unwrap().clone()
        }

        pub fn notifications(&self) -> Vec<Notification> {
            self.published().into_iter().map(|(_, n)| n).collect()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn publish(
            &self,
            user_id: &str,
            notification: Notification,
        ) -> Result<(), NotifyError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(NotifyError("sink unavailable".to_string()));
            }
            self.published
                .lock()
                .unwrap()
                .push((user_id.to_string(), notification));
            Ok(())
        }
    }
}
