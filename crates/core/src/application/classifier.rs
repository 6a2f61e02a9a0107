// Error classification: raw Sender failure -> typed, retry-annotated verdict
use crate::domain::ErrorKind;
use crate::port::SendError;
use tracing::debug;

/// Classified failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub retryable: bool,
    /// Minimum delay before the next attempt (from the taxonomy)
    pub delay_floor_ms: Option<i64>,
    pub message: String,
}

impl ClassifiedError {
    fn new(kind: ErrorKind, message: &str) -> Self {
        let policy = kind.policy();
        Self {
            kind,
            retryable: policy.retryable,
            delay_floor_ms: policy.delay_floor_ms,
            message: format!("[{}] {}", kind, message),
        }
    }
}

// Checked in order; first hit wins. Needles are lowercase.
const MESSAGE_PATTERNS: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::Authentication,
        &[
            "invalid_grant",
            "invalid credentials",
            "unauthorized",
            "unauthenticated",
            "token expired",
            "token has been expired",
            "authentication",
            "re-authorize",
        ],
    ),
    (
        ErrorKind::Quota,
        &[
            "quota",
            "rate limit",
            "ratelimit",
            "too many requests",
            "user-rate",
            "limit exceeded",
        ],
    ),
    (
        ErrorKind::Network,
        &[
            "timed out",
            "timeout",
            "network",
            "connection",
            "econnreset",
            "econnrefused",
            "dns",
            "unreachable",
        ],
    ),
    (
        ErrorKind::Validation,
        &[
            "invalid recipient",
            "invalid email",
            "invalid address",
            "invalid to header",
            "malformed",
            "bad request",
            "recipient address rejected",
        ],
    ),
    (
        ErrorKind::Server,
        &[
            "internal error",
            "internal server error",
            "backend error",
            "service unavailable",
            "bad gateway",
            "server error",
        ],
    ),
];

/// Maps Sender failures onto the taxonomy.
///
/// Precedence: structured kind on the error, then provider status code, then
/// message patterns, else `Unknown`.
#[derive(Debug, Default, Clone)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, err: &SendError) -> ClassifiedError {
        let kind = err
            .kind
            .or_else(|| err.status.and_then(Self::kind_from_status))
            .or_else(|| Self::kind_from_message(&err.message))
            .unwrap_or(ErrorKind::Unknown);

        debug!(
            kind = %kind,
            status = ?err.status,
            structured = err.kind.is_some(),
            "Classified send failure"
        );

        ClassifiedError::new(kind, &err.message)
    }

    fn kind_from_status(status: u16) -> Option<ErrorKind> {
        match status {
            401 | 403 => Some(ErrorKind::Authentication),
            429 => Some(ErrorKind::Quota),
            408 => Some(ErrorKind::Network),
            400 | 404 | 422 => Some(ErrorKind::Validation),
            500..=599 => Some(ErrorKind::Server),
            _ => None,
        }
    }

    fn kind_from_message(message: &str) -> Option<ErrorKind> {
        let lower = message.to_lowercase();
        MESSAGE_PATTERNS
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
            .map(|(kind, _)| *kind)
    }
}
