// Delivery failure taxonomy
//
// TAXONOMY is the single source of truth for retryability, delay hints and escalation.

use serde::{Deserialize, Serialize};

/// Minimum retry delay after a quota failure (5 minutes)
pub const QUOTA_DELAY_FLOOR_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Expired or invalid credential; user must re-authorize upstream
    Authentication,
    /// Rate or quota limit exceeded
    Quota,
    /// Connectivity or timeout
    Network,
    /// Malformed recipient or content
    Validation,
    /// Upstream 5xx / internal error
    Server,
    Unknown,
}

/// Per-kind handling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindPolicy {
    pub kind: ErrorKind,
    pub retryable: bool,
    /// Lower bound on the retry delay; the backoff schedule wins when longer
    pub delay_floor_ms: Option<i64>,
    /// Terminal failures of this kind also raise an escalation
    pub escalates: bool,
}

// Indexed by ErrorKind discriminant
const TAXONOMY: [KindPolicy; 6] = [
    KindPolicy {
        kind: ErrorKind::Authentication,
        retryable: false,
        delay_floor_ms: None,
        escalates: true,
    },
    KindPolicy {
        kind: ErrorKind::Quota,
        retryable: true,
        delay_floor_ms: Some(QUOTA_DELAY_FLOOR_MS),
        escalates: true,
    },
    KindPolicy {
        kind: ErrorKind::Network,
        retryable: true,
        delay_floor_ms: None,
        escalates: false,
    },
    KindPolicy {
        kind: ErrorKind::Validation,
        retryable: false,
        delay_floor_ms: None,
        escalates: false,
    },
    KindPolicy {
        kind: ErrorKind::Server,
        retryable: true,
        delay_floor_ms: None,
        escalates: false,
    },
    KindPolicy {
        kind: ErrorKind::Unknown,
        retryable: true,
        delay_floor_ms: None,
        escalates: false,
    },
];

impl ErrorKind {
    pub fn policy(self) -> &'static KindPolicy {
        &TAXONOMY[self as usize]
    }

    pub fn is_retryable(self) -> bool {
        self.policy().retryable
    }

    pub fn escalates(self) -> bool {
        self.policy().escalates
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Authentication => write!(f, "authentication"),
            ErrorKind::Quota => write!(f, "quota"),
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Server => write!(f, "server"),
            ErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_rows_match_kinds() {
        for kind in [
            ErrorKind::Authentication,
            ErrorKind::Quota,
            ErrorKind::Network,
            ErrorKind::Validation,
            ErrorKind::Server,
            ErrorKind::Unknown,
        ] {
            assert_eq!(kind.policy().kind, kind);
        }
    }

    #[test]
    fn test_retryability_verdicts() {
        assert!(!ErrorKind::Authentication.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(ErrorKind::Quota.is_retryable());
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Server.is_retryable());
        assert!(ErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn test_only_quota_has_delay_floor() {
        assert_eq!(
            ErrorKind::Quota.policy().delay_floor_ms,
            Some(QUOTA_DELAY_FLOOR_MS)
        );
        assert!(ErrorKind::Network.policy().delay_floor_ms.is_none());
    }
}
