//! Fixed-delay retry decorator for save, get and delete.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::storage::{FileInfo, FileMetadata, FileReader, Storage, StorageError};

/// Decides whether a failed attempt should be retried.
pub type RetryPredicate = Arc<dyn Fn(&StorageError) -> bool + Send + Sync>;

/// Retries save, get and delete up to `max_retries` extra times.
///
/// Cancellation and key-validation failures are returned immediately. Every
/// other failure is offered to the retry predicate, which by default retries
/// everything. The pause between attempts races the caller's token, so a
/// cancel during the sleep returns [`StorageError::Canceled`] at once. All
/// other operations pass straight through.
pub struct RetryMiddleware {
    inner: Arc<dyn Storage>,
    max_retries: u32,
    retry_delay: Duration,
    should_retry: RetryPredicate,
}

impl RetryMiddleware {
    /// Wraps `inner` with the default always-retry predicate.
    #[must_use]
    pub fn new(inner: Arc<dyn Storage>, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            retry_delay,
            should_retry: Arc::new(|_| true),
        }
    }

    /// Replaces the retry predicate.
    #[must_use]
    pub fn with_predicate(mut self, should_retry: RetryPredicate) -> Self {
        self.should_retry = should_retry;
        self
    }

    async fn run<T, F, Fut>(
        &self,
        cx: &CancellationToken,
        operation: &'static str,
        key: &str,
        mut attempt_fn: F,
    ) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StorageError>> + Send,
        T: Send,
    {
        let mut attempt: u32 = 0;
        loop {
            let err = match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let retryable = !matches!(err, StorageError::Canceled)
                && !err.is_invalid_key()
                && (self.should_retry)(&err);
            if !retryable || attempt >= self.max_retries {
                return Err(err);
            }

            attempt += 1;
            warn!(
                operation,
                key,
                attempt,
                max_retries = self.max_retries,
                error = %err,
                "storage operation failed, retrying"
            );

            tokio::select! {
                biased;
                () = cx.cancelled() => return Err(StorageError::Canceled),
                () = tokio::time::sleep(self.retry_delay) => {}
            }
        }
    }
}

#[async_trait]
impl Storage for RetryMiddleware {
    async fn save(
        &self,
        cx: &CancellationToken,
        key: &str,
        data: Bytes,
    ) -> Result<(), StorageError> {
        self.run(cx, "save", key, || self.inner.save(cx, key, data.clone()))
            .await
    }

    async fn get(&self, cx: &CancellationToken, key: &str) -> Result<FileReader, StorageError> {
        self.run(cx, "get", key, || self.inner.get(cx, key)).await
    }

    async fn delete(&self, cx: &CancellationToken, key: &str) -> Result<(), StorageError> {
        self.run(cx, "delete", key, || self.inner.delete(cx, key))
            .await
    }

    async fn exists(&self, cx: &CancellationToken, key: &str) -> Result<bool, StorageError> {
        self.inner.exists(cx, key).await
    }

    async fn get_metadata(
        &self,
        cx: &CancellationToken,
        key: &str,
    ) -> Result<FileMetadata, StorageError> {
        self.inner.get_metadata(cx, key).await
    }

    async fn get_size(&self, cx: &CancellationToken, key: &str) -> Result<u64, StorageError> {
        self.inner.get_size(cx, key).await
    }

    fn get_url(&self, key: &str) -> Result<String, StorageError> {
        self.inner.get_url(key)
    }

    async fn get_presigned_url(
        &self,
        cx: &CancellationToken,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        self.inner.get_presigned_url(cx, key, ttl).await
    }

    async fn list(
        &self,
        cx: &CancellationToken,
        prefix: &str,
    ) -> Result<Vec<FileInfo>, StorageError> {
        self.inner.list(cx, prefix).await
    }

    async fn copy(
        &self,
        cx: &CancellationToken,
        src: &str,
        dst: &str,
    ) -> Result<(), StorageError> {
        self.inner.copy(cx, src, dst).await
    }

    async fn move_file(
        &self,
        cx: &CancellationToken,
        src: &str,
        dst: &str,
    ) -> Result<(), StorageError> {
        self.inner.move_file(cx, src, dst).await
    }

    fn join_path(&self, parts: &[&str]) -> String {
        self.inner.join_path(parts)
    }

    fn validate_key(&self, key: &str) -> Result<(), StorageError> {
        self.inner.validate_key(key)
    }
}
