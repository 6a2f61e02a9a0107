// Sender Port - the provider transport that actually delivers a message

use crate::domain::{EmailJob, ErrorKind, JobMetadata};
use async_trait::async_trait;
use thiserror::Error;

/// Borrowed view of the message handed to the transport
#[derive(Debug, Clone, Copy)]
pub struct OutgoingEmail<'a> {
    pub recipient: &'a str,
    pub subject: &'a str,
    pub content: &'a str,
    pub metadata: Option<&'a JobMetadata>,
}

impl<'a> From<&'a EmailJob> for OutgoingEmail<'a> {
    fn from(job: &'a EmailJob) -> Self {
        Self {
            recipient: &job.recipient,
            subject: &job.subject,
            content: &job.content,
            metadata: job.metadata.as_ref(),
        }
    }
}

/// Provider-reported failure.
///
/// Transports that know what went wrong set `kind` or `status`; the rest only
/// carry a message and are classified by pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SendError {
    pub kind: Option<ErrorKind>,
    pub status: Option<u16>,
    pub message: String,
}

impl SendError {
    /// Unstructured failure (message only)
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: None,
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Sender trait
///
/// Implementations:
/// - SpoolSender (infra-system): writes envelopes to a local spool directory
/// - MockSender: scripted outcomes for tests
#[async_trait]
pub trait Sender: Send + Sync {
    /// Deliver one message and return the provider message id
    async fn send(&self, email: OutgoingEmail<'_>) -> Result<String, SendError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type SendHook = Box<dyn Fn(&str) + Send + Sync>;

    /// Mock Sender: pops scripted outcomes, succeeds once the script is empty
    #[derive(Default)]
    pub struct MockSender {
        script: Mutex<VecDeque<Result<String, SendError>>>,
        calls: Mutex<Vec<String>>,
        hook: Mutex<Option<SendHook>>,
    }

    impl MockSender {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every call fails with `err` until `n` outcomes are consumed
        pub fn failing(err: SendError, n: usize) -> Self {
            let sender = Self::new();
            for _ in 0..n {
                sender.push(Err(err.clone()));
            }
            sender
        }

        pub fn push(&self, outcome: Result<String, SendError>) {
            self.script.lock().unwrap().push_back(outcome);
        }

        /// Runs with the recipient while the send is "in flight"
        pub fn on_send(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
            *self.hook.lock().unwrap() = Some(Box::new(hook));
        }

        /// Recipients in call order
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Sender for MockSender {
        async fn send(&self, email: OutgoingEmail<'_>) -> Result<String, SendError> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(email.recipient.to_string());
                calls.len()
            };

            if let Some(hook) = self.hook.lock().unwrap().as_ref() {
                hook(email.recipient);
            }

            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(format!("mock-msg-{}", n)))
        }
    }
}
