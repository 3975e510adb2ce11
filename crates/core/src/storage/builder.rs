//! Assembly of the production storage chain.

use std::sync::Arc;

use super::config::{StorageConfig, StorageProvider};
use super::error::StorageError;
use super::local::LocalStorage;
use super::middleware::{LoggingMiddleware, RetryMiddleware, RetryPredicate, ValidationMiddleware};
use super::s3::S3Storage;
use super::Storage;

/// Builds `Logging -> Retry -> Validation -> backend` from a [`StorageConfig`].
///
/// # Example
///
/// ```no_run
/// use repgen_core::storage::{StorageBuilder, StorageConfig, StorageProvider};
///
/// let storage = StorageBuilder::new(StorageConfig::new(StorageProvider::local_fs("./data")))
///     .build()
///     .expect("storage chain");
/// ```
pub struct StorageBuilder {
    config: StorageConfig,
    retry_predicate: Option<RetryPredicate>,
}

impl StorageBuilder {
    /// Starts a builder for `config`.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            retry_predicate: None,
        }
    }

    /// Overrides the retry predicate (default: retry every I/O failure).
    #[must_use]
    pub fn with_retry_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.retry_predicate = Some(predicate);
        self
    }

    /// Opens the configured backend and wraps it.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the backend cannot be initialised.
    pub fn build(self) -> Result<Arc<dyn Storage>, StorageError> {
        self.config.provider.validate()?;
        let backend: Arc<dyn Storage> = match &self.config.provider {
            StorageProvider::LocalFs { root } => Arc::new(LocalStorage::new(root)?),
            provider @ StorageProvider::S3 { .. } => Arc::new(S3Storage::new(provider)?),
        };
        tracing::info!(
            provider = self.config.provider.name(),
            max_retries = self.config.max_retries,
            "storage backend initialised"
        );
        Ok(self.wrap(backend))
    }

    /// Wraps an already-constructed backend.
    #[must_use]
    pub fn wrap(self, backend: Arc<dyn Storage>) -> Arc<dyn Storage> {
        let validated: Arc<dyn Storage> = Arc::new(ValidationMiddleware::new(backend));
        let mut retry = RetryMiddleware::new(
            validated,
            self.config.max_retries,
            self.config.retry_delay,
        );
        if let Some(predicate) = self.retry_predicate {
            retry = retry.with_predicate(predicate);
        }
        Arc::new(LoggingMiddleware::new(Arc::new(retry)))
    }
}
