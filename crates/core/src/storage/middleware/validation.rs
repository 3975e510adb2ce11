//! Key validation decorator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::storage::{FileInfo, FileMetadata, FileReader, Storage, StorageError};

/// Runs the inner storage's `validate_key` before every key-bearing
/// operation. An invalid key never reaches the backend.
pub struct ValidationMiddleware {
    inner: Arc<dyn Storage>,
}

impl ValidationMiddleware {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn Storage>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Storage for ValidationMiddleware {
    async fn save(
        &self,
        cx: &CancellationToken,
        key: &str,
        data: Bytes,
    ) -> Result<(), StorageError> {
        self.inner.validate_key(key)?;
        self.inner.save(cx, key, data).await
    }

    async fn get(&self, cx: &CancellationToken, key: &str) -> Result<FileReader, StorageError> {
        self.inner.validate_key(key)?;
        self.inner.get(cx, key).await
    }

    async fn delete(&self, cx: &CancellationToken, key: &str) -> Result<(), StorageError> {
        self.inner.validate_key(key)?;
        self.inner.delete(cx, key).await
    }

    async fn exists(&self, cx: &CancellationToken, key: &str) -> Result<bool, StorageError> {
        self.inner.validate_key(key)?;
        self.inner.exists(cx, key).await
    }

    async fn get_metadata(
        &self,
        cx: &CancellationToken,
        key: &str,
    ) -> Result<FileMetadata, StorageError> {
        self.inner.validate_key(key)?;
        self.inner.get_metadata(cx, key).await
    }

    async fn get_size(&self, cx: &CancellationToken, key: &str) -> Result<u64, StorageError> {
        self.inner.validate_key(key)?;
        self.inner.get_size(cx, key).await
    }

    fn get_url(&self, key: &str) -> Result<String, StorageError> {
        self.inner.validate_key(key)?;
        self.inner.get_url(key)
    }

    async fn get_presigned_url(
        &self,
        cx: &CancellationToken,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        self.inner.validate_key(key)?;
        self.inner.get_presigned_url(cx, key, ttl).await
    }

    // An empty prefix lists everything and is allowed.
    async fn list(
        &self,
        cx: &CancellationToken,
        prefix: &str,
    ) -> Result<Vec<FileInfo>, StorageError> {
        if !prefix.is_empty() {
            self.inner.validate_key(prefix)?;
        }
        self.inner.list(cx, prefix).await
    }

    async fn copy(
        &self,
        cx: &CancellationToken,
        src: &str,
        dst: &str,
    ) -> Result<(), StorageError> {
        self.inner.validate_key(src)?;
        self.inner.validate_key(dst)?;
        self.inner.copy(cx, src, dst).await
    }

    async fn move_file(
        &self,
        cx: &CancellationToken,
        src: &str,
        dst: &str,
    ) -> Result<(), StorageError> {
        self.inner.validate_key(src)?;
        self.inner.validate_key(dst)?;
        self.inner.move_file(cx, src, dst).await
    }

    fn join_path(&self, parts: &[&str]) -> String {
        self.inner.join_path(parts)
    }

    fn validate_key(&self, key: &str) -> Result<(), StorageError> {
        self.inner.validate_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::middleware::testing::ScriptedStorage;

    #[tokio::test]
    async fn test_invalid_key_never_reaches_backend() {
        let backend = Arc::new(ScriptedStorage::default());
        let storage = ValidationMiddleware::new(backend.clone());
        let cx = CancellationToken::new();

        let err = storage
            .save(&cx, "../escape.txt", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::PathTraversal { .. }));

        let err = storage.delete(&cx, "").await.unwrap_err();
        assert!(matches!(err, StorageError::EmptyKey));

        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_move_checks_both_keys() {
        let backend = Arc::new(ScriptedStorage::default());
        let storage = ValidationMiddleware::new(backend.clone());
        let cx = CancellationToken::new();

        storage
            .save(&cx, "a.txt", Bytes::from_static(b"x"))
            .await
            .expect("save");
        let err = storage.move_file(&cx, "a.txt", "../b.txt").await.unwrap_err();
        assert!(matches!(err, StorageError::PathTraversal { .. }));
        assert!(storage.exists(&cx, "a.txt").await.expect("exists"));
    }

    #[tokio::test]
    async fn test_valid_key_is_delegated() {
        let backend = Arc::new(ScriptedStorage::default());
        let storage = ValidationMiddleware::new(backend.clone());
        let cx = CancellationToken::new();

        storage
            .save(&cx, "reports/1/a.json", Bytes::from_static(b"{}"))
            .await
            .expect("save");
        assert_eq!(backend.calls(), 1);
        assert_eq!(storage.get_size(&cx, "reports/1/a.json").await.expect("size"), 2);
        assert_eq!(storage.list(&cx, "").await.expect("list").len(), 1);
    }
}
