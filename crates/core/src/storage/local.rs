//! Local filesystem backend.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use opendal::{Operator, services};
use tokio_util::sync::CancellationToken;

use super::backend::OpendalStore;
use super::error::StorageError;
use super::types::{FileInfo, FileMetadata, FileReader};
use super::{Storage, with_cancel};

/// Stores files under a root directory.
///
/// Keys are relative paths below the root. Parent directories are created on
/// write, and keys with `..` segments are rejected.
pub struct LocalStorage {
    root: PathBuf,
    store: OpendalStore,
}

impl LocalStorage {
    /// Opens a local storage rooted at `root`, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the root cannot be created or is not
    /// valid UTF-8.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Err(StorageError::configuration("local root path is required"));
        }
        std::fs::create_dir_all(root).map_err(|e| {
            StorageError::configuration(format!(
                "cannot create storage root {}: {e}",
                root.display()
            ))
        })?;
        let root = std::path::absolute(root)
            .map_err(|e| StorageError::configuration(format!("invalid storage root: {e}")))?;

        let builder = services::Fs::default().root(
            root.to_str()
                .ok_or_else(|| StorageError::configuration("invalid path"))?,
        );
        let op = Operator::new(builder)
            .map_err(|e| StorageError::configuration(e.to_string()))?
            .finish();

        Ok(Self {
            root,
            store: OpendalStore::new(op),
        })
    }

    /// Returns the absolute root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save(
        &self,
        cx: &CancellationToken,
        key: &str,
        data: Bytes,
    ) -> Result<(), StorageError> {
        self.store.save(cx, key, data).await
    }

    async fn get(&self, cx: &CancellationToken, key: &str) -> Result<FileReader, StorageError> {
        self.store.get(cx, key).await
    }

    async fn delete(&self, cx: &CancellationToken, key: &str) -> Result<(), StorageError> {
        self.store.delete(cx, key).await
    }

    async fn exists(&self, cx: &CancellationToken, key: &str) -> Result<bool, StorageError> {
        self.store.exists(cx, key).await
    }

    async fn get_metadata(
        &self,
        cx: &CancellationToken,
        key: &str,
    ) -> Result<FileMetadata, StorageError> {
        self.store.metadata(cx, key).await
    }

    fn get_url(&self, key: &str) -> Result<String, StorageError> {
        Ok(format!("file://{}", self.root.join(key).display()))
    }

    // Files on disk have no signed form; the plain address is returned.
    async fn get_presigned_url(
        &self,
        cx: &CancellationToken,
        key: &str,
        _ttl: Duration,
    ) -> Result<String, StorageError> {
        with_cancel(cx, async { self.get_url(key) }).await
    }

    async fn list(
        &self,
        cx: &CancellationToken,
        prefix: &str,
    ) -> Result<Vec<FileInfo>, StorageError> {
        self.store.list(cx, prefix).await
    }

    async fn copy(
        &self,
        cx: &CancellationToken,
        src: &str,
        dst: &str,
    ) -> Result<(), StorageError> {
        self.validate_key(src)?;
        self.validate_key(dst)?;
        self.store.copy(cx, src, dst).await
    }

    async fn move_file(
        &self,
        cx: &CancellationToken,
        src: &str,
        dst: &str,
    ) -> Result<(), StorageError> {
        self.validate_key(src)?;
        self.validate_key(dst)?;
        self.store.copy(cx, src, dst).await?;
        self.store.delete(cx, src).await
    }

    fn validate_key(&self, key: &str) -> Result<(), StorageError> {
        validate_local_key(key)
    }
}

/// Rejects empty keys and keys with a `..` segment.
pub(crate) fn validate_local_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::EmptyKey);
    }
    if key.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(StorageError::PathTraversal {
            key: key.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn storage() -> (tempfile::TempDir, LocalStorage) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = LocalStorage::new(dir.path()).expect("local storage");
        (dir, storage)
    }

    #[test]
    fn test_validate_key() {
        assert!(matches!(validate_local_key(""), Err(StorageError::EmptyKey)));
        assert!(matches!(
            validate_local_key("../x"),
            Err(StorageError::PathTraversal { .. })
        ));
        assert!(matches!(
            validate_local_key("reports/../../etc/passwd"),
            Err(StorageError::PathTraversal { .. })
        ));
        assert!(validate_local_key("reports/7/x..y.json").is_ok());
        assert!(validate_local_key("reports/7/x.json").is_ok());
    }

    #[tokio::test]
    async fn test_save_creates_directories_and_get_reads_back() {
        let (dir, storage) = storage();
        let cx = CancellationToken::new();

        storage
            .save(&cx, "reports/1/out.json", Bytes::from_static(b"{}"))
            .await
            .expect("save");
        assert!(dir.path().join("reports/1/out.json").exists());

        let mut reader = storage.get(&cx, "reports/1/out.json").await.expect("get");
        let mut content = String::new();
        reader.read_to_string(&mut content).await.expect("read");
        assert_eq!(content, "{}");
    }

    #[tokio::test]
    async fn test_get_streams_large_file_in_chunks() {
        let (_dir, storage) = storage();
        let cx = CancellationToken::new();
        let data: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();

        storage
            .save(&cx, "reports/2/big.csv", Bytes::from(data.clone()))
            .await
            .expect("save");

        let mut reader = storage.get(&cx, "reports/2/big.csv").await.expect("get");
        let mut chunk = vec![0u8; 64 * 1024];
        let mut read = Vec::with_capacity(data.len());
        loop {
            let n = reader.read(&mut chunk).await.expect("read");
            if n == 0 {
                break;
            }
            assert!(n <= chunk.len());
            read.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(read, data);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_dir, storage) = storage();
        let cx = CancellationToken::new();

        let err = storage.get(&cx, "missing.json").await.err().expect("error");
        assert!(err.is_not_found());
        let err = storage
            .get_metadata(&cx, "missing.json")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, storage) = storage();
        let cx = CancellationToken::new();

        storage
            .save(&cx, "a.txt", Bytes::from_static(b"a"))
            .await
            .expect("save");
        storage.delete(&cx, "a.txt").await.expect("first delete");
        storage.delete(&cx, "a.txt").await.expect("second delete");
        assert!(!storage.exists(&cx, "a.txt").await.expect("exists"));
    }

    #[tokio::test]
    async fn test_metadata_and_size() {
        let (_dir, storage) = storage();
        let cx = CancellationToken::new();

        storage
            .save(&cx, "r/a.bin", Bytes::from_static(b"12345"))
            .await
            .expect("save");
        let meta = storage.get_metadata(&cx, "r/a.bin").await.expect("meta");
        assert_eq!(meta.key, "r/a.bin");
        assert_eq!(meta.size, 5);
        assert_eq!(storage.get_size(&cx, "r/a.bin").await.expect("size"), 5);
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix() {
        let (_dir, storage) = storage();
        let cx = CancellationToken::new();

        for key in ["reports/1/a.json", "reports/1/b.json", "reports/2/c.json"] {
            storage
                .save(&cx, key, Bytes::from_static(b"x"))
                .await
                .expect("save");
        }

        let keys: Vec<String> = storage
            .list(&cx, "reports/1/")
            .await
            .expect("list")
            .into_iter()
            .map(|f| f.key)
            .collect();
        assert_eq!(keys, vec!["reports/1/a.json", "reports/1/b.json"]);

        let all = storage.list(&cx, "reports/").await.expect("list");
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_copy_and_move() {
        let (_dir, storage) = storage();
        let cx = CancellationToken::new();

        storage
            .save(&cx, "src.txt", Bytes::from_static(b"data"))
            .await
            .expect("save");
        storage
            .copy(&cx, "src.txt", "copy.txt")
            .await
            .expect("copy");
        assert!(storage.exists(&cx, "src.txt").await.expect("exists"));
        assert!(storage.exists(&cx, "copy.txt").await.expect("exists"));

        storage
            .move_file(&cx, "copy.txt", "moved/dst.txt")
            .await
            .expect("move");
        assert!(!storage.exists(&cx, "copy.txt").await.expect("exists"));
        assert!(storage.exists(&cx, "moved/dst.txt").await.expect("exists"));
    }

    #[tokio::test]
    async fn test_copy_rejects_traversal_before_io() {
        let (_dir, storage) = storage();
        let cx = CancellationToken::new();

        let err = storage.copy(&cx, "a.txt", "../b.txt").await.unwrap_err();
        assert!(matches!(err, StorageError::PathTraversal { .. }));
    }

    #[tokio::test]
    async fn test_urls_use_file_scheme() {
        let (_dir, storage) = storage();
        let cx = CancellationToken::new();

        let url = storage.get_url("reports/1/a.json").expect("url");
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("reports/1/a.json"));

        let presigned = storage
            .get_presigned_url(&cx, "reports/1/a.json", Duration::from_secs(60))
            .await
            .expect("presigned");
        assert_eq!(presigned, url);
    }

    #[tokio::test]
    async fn test_canceled_token_aborts_save() {
        let (_dir, storage) = storage();
        let cx = CancellationToken::new();
        cx.cancel();

        let err = storage
            .save(&cx, "a.txt", Bytes::from_static(b"a"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Canceled));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Any key with a parent-directory segment is rejected.
        #[test]
        fn prop_parent_segment_always_rejected(
            head in "[a-z0-9]{0,8}(/[a-z0-9]{1,8}){0,3}",
            tail in "([a-z0-9]{1,8}/){0,3}[a-z0-9]{1,8}",
        ) {
            let key = if head.is_empty() {
                format!("../{tail}")
            } else {
                format!("{head}/../{tail}")
            };
            let rejected = matches!(validate_local_key(&key), Err(StorageError::PathTraversal { .. }));
            prop_assert!(rejected);
        }

        // Keys built from plain segments are accepted.
        #[test]
        fn prop_plain_keys_accepted(key in "[a-z0-9_.-]{1,8}(/[a-z0-9_-]{1,8}){0,4}") {
            prop_assume!(!key.split('/').any(|s| s == ".."));
            prop_assert!(validate_local_key(&key).is_ok());
        }
    }
}
