//! Report entity error types.

use repgen_shared::AppError;
use thiserror::Error;

use super::types::ReportStatus;

/// Errors raised by the report entity and its state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    /// The requested status change is not an edge of the lifecycle.
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

    /// A field is missing or out of bounds.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl ReportError {
    /// Creates an invalid transition error.
    #[must_use]
    pub fn invalid_transition(from: ReportStatus, to: ReportStatus) -> Self {
        Self::InvalidTransition { from, to }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidTransition { .. } => 409,
            Self::InvalidStatus(_) | Self::Validation(_) => 400,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InvalidStatus(_) => "INVALID_STATUS",
            Self::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

impl From<validator::ValidationErrors> for ReportError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect();
        messages.sort();
        Self::Validation(messages.join("; "))
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::InvalidTransition { .. } => Self::Conflict(err.to_string()),
            ReportError::InvalidStatus(_) | ReportError::Validation(_) => {
                Self::Validation(err.to_string())
            }
        }
    }
}
