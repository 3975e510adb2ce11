//! Structured logging decorator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::storage::{FileInfo, FileMetadata, FileReader, Storage, StorageError};

/// Logs start, duration and outcome of every operation with the target key.
/// Results pass through untouched.
pub struct LoggingMiddleware {
    inner: Arc<dyn Storage>,
}

impl LoggingMiddleware {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn Storage>) -> Self {
        Self { inner }
    }

    async fn observe<T, Fut>(
        &self,
        operation: &'static str,
        key: &str,
        fut: Fut,
    ) -> Result<T, StorageError>
    where
        Fut: Future<Output = Result<T, StorageError>> + Send,
    {
        debug!(operation, key, "storage operation started");
        let started = Instant::now();
        let result = fut.await;
        record(operation, key, started, result.as_ref().err());
        result
    }
}

fn record(operation: &'static str, key: &str, started: Instant, err: Option<&StorageError>) {
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    match err {
        None => info!(operation, key, duration_ms, "storage operation completed"),
        Some(e) => error!(operation, key, duration_ms, error = %e, "storage operation failed"),
    }
}

#[async_trait]
impl Storage for LoggingMiddleware {
    async fn save(
        &self,
        cx: &CancellationToken,
        key: &str,
        data: Bytes,
    ) -> Result<(), StorageError> {
        let size = data.len();
        debug!(key, size, "saving file");
        self.observe("save", key, self.inner.save(cx, key, data))
            .await
    }

    async fn get(&self, cx: &CancellationToken, key: &str) -> Result<FileReader, StorageError> {
        self.observe("get", key, self.inner.get(cx, key)).await
    }

    async fn delete(&self, cx: &CancellationToken, key: &str) -> Result<(), StorageError> {
        self.observe("delete", key, self.inner.delete(cx, key)).await
    }

    async fn exists(&self, cx: &CancellationToken, key: &str) -> Result<bool, StorageError> {
        self.observe("exists", key, self.inner.exists(cx, key)).await
    }

    async fn get_metadata(
        &self,
        cx: &CancellationToken,
        key: &str,
    ) -> Result<FileMetadata, StorageError> {
        self.observe("get_metadata", key, self.inner.get_metadata(cx, key))
            .await
    }

    async fn get_size(&self, cx: &CancellationToken, key: &str) -> Result<u64, StorageError> {
        self.observe("get_size", key, self.inner.get_size(cx, key))
            .await
    }

    fn get_url(&self, key: &str) -> Result<String, StorageError> {
        let started = Instant::now();
        let result = self.inner.get_url(key);
        record("get_url", key, started, result.as_ref().err());
        result
    }

    async fn get_presigned_url(
        &self,
        cx: &CancellationToken,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        self.observe(
            "get_presigned_url",
            key,
            self.inner.get_presigned_url(cx, key, ttl),
        )
        .await
    }

    async fn list(
        &self,
        cx: &CancellationToken,
        prefix: &str,
    ) -> Result<Vec<FileInfo>, StorageError> {
        self.observe("list", prefix, self.inner.list(cx, prefix))
            .await
    }

    async fn copy(
        &self,
        cx: &CancellationToken,
        src: &str,
        dst: &str,
    ) -> Result<(), StorageError> {
        debug!(key = src, destination = dst, "copying file");
        self.observe("copy", src, self.inner.copy(cx, src, dst))
            .await
    }

    async fn move_file(
        &self,
        cx: &CancellationToken,
        src: &str,
        dst: &str,
    ) -> Result<(), StorageError> {
        debug!(key = src, destination = dst, "moving file");
        self.observe("move", src, self.inner.move_file(cx, src, dst))
            .await
    }

    fn join_path(&self, parts: &[&str]) -> String {
        self.inner.join_path(parts)
    }

    fn validate_key(&self, key: &str) -> Result<(), StorageError> {
        let result = self.inner.validate_key(key);
        if let Err(e) = &result {
            debug!(key, error = %e, "storage key rejected");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::middleware::testing::ScriptedStorage;

    #[tokio::test]
    async fn test_results_pass_through_unchanged() {
        let backend = Arc::new(ScriptedStorage::failing(1));
        let storage = LoggingMiddleware::new(backend.clone());
        let cx = CancellationToken::new();

        let err = storage
            .save(&cx, "a.txt", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));

        storage
            .save(&cx, "a.txt", Bytes::from_static(b"x"))
            .await
            .expect("second save");
        assert!(storage.exists(&cx, "a.txt").await.expect("exists"));
        assert_eq!(storage.get_url("a.txt").expect("url"), "mem://a.txt");
        assert_eq!(storage.join_path(&["a", "b"]), "a/b");
    }
}
