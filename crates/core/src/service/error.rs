//! Report service error types.

use repgen_shared::AppError;
use repgen_shared::types::ReportId;
use thiserror::Error;

use crate::processor::ProcessorError;
use crate::report::{ReportError, ReportStatus, RepositoryError};
use crate::storage::StorageError;

/// Errors returned by [`ReportService`](super::ReportService).
#[derive(Debug, Error)]
pub enum ReportServiceError {
    /// Report not found.
    #[error("Report not found: {0}")]
    NotFound(ReportId),

    /// The status change is not an edge of the lifecycle.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: ReportStatus,
        /// Requested status.
        to: ReportStatus,
    },

    /// The status value is not recognised.
    #[error("Invalid report status: {0}")]
    InvalidStatus(String),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The report has no downloadable file yet.
    #[error("Report {id} is not ready (status: {status})")]
    NotReady {
        /// Report ID.
        id: ReportId,
        /// Current status.
        status: ReportStatus,
    },

    /// The report is completed but carries no file key.
    #[error("Report {0} is completed but has no file")]
    FileMissing(ReportId),

    /// The processor queue rejected the generation task.
    #[error("Report generation queue is full")]
    QueueFull,

    /// Any other processor failure.
    #[error(transparent)]
    Processor(ProcessorError),

    /// Persistence failure.
    #[error(transparent)]
    Repository(RepositoryError),

    /// File storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ReportServiceError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::FileMissing(_) => 404,
            Self::InvalidTransition { .. } | Self::NotReady { .. } => 409,
            Self::InvalidStatus(_) | Self::Validation(_) => 400,
            Self::QueueFull => 503,
            Self::Processor(e) => e.status_code(),
            Self::Storage(e) => e.status_code(),
            Self::Repository(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InvalidStatus(_) => "INVALID_STATUS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotReady { .. } => "REPORT_NOT_READY",
            Self::FileMissing(_) => "FILE_MISSING",
            Self::QueueFull => "QUEUE_FULL",
            Self::Processor(e) => e.error_code(),
            Self::Repository(_) => "DATABASE_ERROR",
            Self::Storage(e) => e.error_code(),
        }
    }
}

impl From<ReportError> for ReportServiceError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            ReportError::InvalidStatus(s) => Self::InvalidStatus(s),
            ReportError::Validation(msg) => Self::Validation(msg),
        }
    }
}

impl From<RepositoryError> for ReportServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound(id),
            other @ RepositoryError::Database(_) => Self::Repository(other),
        }
    }
}

impl From<ProcessorError> for ReportServiceError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::QueueFull => Self::QueueFull,
            other => Self::Processor(other),
        }
    }
}

impl From<ReportServiceError> for AppError {
    fn from(err: ReportServiceError) -> Self {
        match err {
            ReportServiceError::NotFound(_) | ReportServiceError::FileMissing(_) => {
                Self::NotFound(err.to_string())
            }
            ReportServiceError::InvalidTransition { .. } | ReportServiceError::NotReady { .. } => {
                Self::Conflict(err.to_string())
            }
            ReportServiceError::InvalidStatus(_) | ReportServiceError::Validation(_) => {
                Self::Validation(err.to_string())
            }
            ReportServiceError::QueueFull => Self::Unavailable(err.to_string()),
            ReportServiceError::Processor(e) => e.into(),
            ReportServiceError::Repository(e) => e.into(),
            ReportServiceError::Storage(e) => e.into(),
        }
    }
}
