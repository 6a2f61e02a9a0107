// Domain errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Lifecycle rule violated, e.g. sending a cancelled job
    #[error("Job cannot move from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown priority '{0}' (expected low, normal or high)")]
    InvalidPriority(String),

    #[error("Unknown job status '{0}'")]
    InvalidStatus(String),

    #[error("Invalid value: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
