//! Storage error types.

use repgen_shared::AppError;
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Key is empty.
    #[error("storage key must not be empty")]
    EmptyKey,

    /// Key contains a parent-directory segment.
    #[error("storage key '{key}' contains a path traversal segment")]
    PathTraversal {
        /// The rejected key.
        key: String,
    },

    /// Key is longer than the backend accepts.
    #[error("storage key is {len} bytes long, maximum is {max}")]
    KeyTooLong {
        /// Length of the rejected key.
        len: usize,
        /// Backend limit.
        max: usize,
    },

    /// File not found in storage.
    #[error("file not found: {key}")]
    NotFound {
        /// Storage key that was not found.
        key: String,
    },

    /// Backend read/write failure.
    #[error("storage I/O failure on '{key}': {message}")]
    Io {
        /// Key the operation targeted.
        key: String,
        /// Backend message.
        message: String,
    },

    /// Presign operation not supported by provider.
    #[error("presign operation not supported by storage provider")]
    PresignNotSupported,

    /// Storage provider configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// The caller's cancellation token fired before the operation finished.
    #[error("storage operation canceled")]
    Canceled,
}

impl StorageError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an I/O failure.
    #[must_use]
    pub fn io(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Maps an OpenDAL error raised while operating on `key`.
    #[must_use]
    pub fn from_opendal(key: &str, err: &opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::not_found(key),
            opendal::ErrorKind::Unsupported => Self::PresignNotSupported,
            _ => Self::io(key, err.to_string()),
        }
    }

    /// Returns true for key-safety violations.
    #[must_use]
    pub fn is_invalid_key(&self) -> bool {
        matches!(
            self,
            Self::EmptyKey | Self::PathTraversal { .. } | Self::KeyTooLong { .. }
        )
    }

    /// Returns true if the key does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::EmptyKey | Self::PathTraversal { .. } | Self::KeyTooLong { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::PresignNotSupported => 501,
            Self::Io { .. } | Self::Configuration(_) | Self::Canceled => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyKey => "EMPTY_KEY",
            Self::PathTraversal { .. } => "PATH_TRAVERSAL",
            Self::KeyTooLong { .. } => "KEY_TOO_LONG",
            Self::NotFound { .. } => "FILE_NOT_FOUND",
            Self::Io { .. } => "STORAGE_IO_FAILURE",
            Self::PresignNotSupported => "PRESIGN_NOT_SUPPORTED",
            Self::Configuration(_) => "STORAGE_CONFIGURATION",
            Self::Canceled => "CANCELED",
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Self::NotFound(err.to_string()),
            e if e.is_invalid_key() => Self::Validation(e.to_string()),
            e => Self::ExternalService(e.to_string()),
        }
    }
}
