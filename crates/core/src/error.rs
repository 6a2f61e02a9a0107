// Central Error Type for the Application

use crate::domain::{DomainError, JobId};
use thiserror::Error;

/// Errors returned by queue operations.
///
/// Provider failures never appear here: the dispatcher turns every `SendError`
/// into a job status change instead of an error.
#[derive(Error, Debug)]
pub enum AppError {
    /// A job refused a lifecycle transition
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Request rejected before enqueue
    #[error("Invalid email request: {0}")]
    Validation(String),

    /// Store failure, already mapped from the driver error
    #[error("Job store error: {0}")]
    Database(String),

    #[error("Malformed JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// Manual operation not allowed in the job's current status
    #[error("Invalid job state: {0}")]
    InvalidState(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
