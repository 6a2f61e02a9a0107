// User-facing notification model

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    EmailSent,
    RetryScheduled,
    EmailFailed,
    /// Severe terminal condition (authentication / quota) needing operator action
    Escalation,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::EmailSent => write!(f, "email_sent"),
            NotificationType::RetryScheduled => write!(f, "retry_scheduled"),
            NotificationType::EmailFailed => write!(f, "email_failed"),
            NotificationType::Escalation => write!(f, "escalation"),
        }
    }
}

impl FromStr for NotificationType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email_sent" => Ok(NotificationType::EmailSent),
            "retry_scheduled" => Ok(NotificationType::RetryScheduled),
            "email_failed" => Ok(NotificationType::EmailFailed),
            "escalation" => Ok(NotificationType::Escalation),
            other => Err(DomainError::ValidationError(format!(
                "Unknown notification type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationLevel::Info => write!(f, "info"),
            NotificationLevel::Warning => write!(f, "warning"),
            NotificationLevel::Error => write!(f, "error"),
        }
    }
}

impl FromStr for NotificationLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(NotificationLevel::Info),
            "warning" => Ok(NotificationLevel::Warning),
            "error" => Ok(NotificationLevel::Error),
            other => Err(DomainError::ValidationError(format!(
                "Unknown notification level: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub level: NotificationLevel,
}
