//! Processor error types.

use repgen_shared::AppError;
use thiserror::Error;

use super::types::TaskId;

/// Errors raised by the background processor and task handlers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProcessorError {
    /// The queue had no free slot at submission time.
    #[error("task queue is full")]
    QueueFull,

    /// A task with this id is still queued or running.
    #[error("task {0} is already outstanding")]
    DuplicateTask(TaskId),

    /// No registered task has this id (never existed or already finished).
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// `start` was called twice.
    #[error("processor already started")]
    AlreadyStarted,

    /// The processor is shutting down and accepts no work.
    #[error("processor is shutting down")]
    ShuttingDown,

    /// A handler reported a failure.
    #[error("task handler failed: {0}")]
    Handler(String),
}

impl ProcessorError {
    /// Create a handler failure.
    #[must_use]
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::TaskNotFound(_) => 404,
            Self::DuplicateTask(_) => 409,
            Self::QueueFull | Self::ShuttingDown => 503,
            Self::AlreadyStarted | Self::Handler(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::QueueFull => "QUEUE_FULL",
            Self::DuplicateTask(_) => "DUPLICATE_TASK",
            Self::TaskNotFound(_) => "TASK_NOT_FOUND",
            Self::AlreadyStarted => "ALREADY_STARTED",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::Handler(_) => "TASK_FAILED",
        }
    }
}

impl From<ProcessorError> for AppError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::TaskNotFound(_) => Self::NotFound(err.to_string()),
            ProcessorError::DuplicateTask(_) => Self::Conflict(err.to_string()),
            ProcessorError::QueueFull | ProcessorError::ShuttingDown => {
                Self::Unavailable(err.to_string())
            }
            ProcessorError::AlreadyStarted | ProcessorError::Handler(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert_eq!(ProcessorError::QueueFull.status_code(), 503);
        assert_eq!(
            ProcessorError::TaskNotFound(TaskId::new("x")).status_code(),
            404
        );
        let app: AppError = ProcessorError::DuplicateTask(TaskId::new("x")).into();
        assert!(matches!(app, AppError::Conflict(_)));
        let app: AppError = ProcessorError::QueueFull.into();
        assert!(matches!(app, AppError::Unavailable(_)));
    }
}
