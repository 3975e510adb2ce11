//! File storage for generated reports.
//!
//! A [`Storage`] is a uniform set of file operations over a swappable
//! backend. Two backends are provided, both built on Apache OpenDAL:
//!
//! - [`LocalStorage`] - local filesystem, rejects path traversal
//! - [`S3Storage`] - any S3-compatible object store
//!
//! Cross-cutting behavior is layered on with the decorators in
//! [`middleware`]; [`StorageBuilder`] assembles the production chain
//! `Logging -> Retry -> Validation -> backend`.
//!
//! Every I/O operation takes the caller's [`CancellationToken`] and returns
//! [`StorageError::Canceled`] as soon as it fires.

mod backend;
mod builder;
mod config;
mod error;
mod local;
pub mod middleware;
mod s3;
mod types;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

pub use builder::StorageBuilder;
pub use config::{StorageConfig, StorageProvider};
pub use error::StorageError;
pub use local::LocalStorage;
pub use s3::S3Storage;
pub use types::{FileInfo, FileMetadata, FileReader};

/// Uniform file operations over a storage backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Writes or overwrites `data` at `key`.
    async fn save(&self, cx: &CancellationToken, key: &str, data: Bytes)
    -> Result<(), StorageError>;

    /// Opens the content at `key` for reading.
    async fn get(&self, cx: &CancellationToken, key: &str) -> Result<FileReader, StorageError>;

    /// Removes the content at `key`. Deleting a missing key succeeds.
    async fn delete(&self, cx: &CancellationToken, key: &str) -> Result<(), StorageError>;

    /// Returns whether `key` exists.
    async fn exists(&self, cx: &CancellationToken, key: &str) -> Result<bool, StorageError>;

    /// Returns the metadata of `key`, failing with `NotFound` if absent.
    async fn get_metadata(
        &self,
        cx: &CancellationToken,
        key: &str,
    ) -> Result<FileMetadata, StorageError>;

    /// Returns the size of `key` in bytes.
    async fn get_size(&self, cx: &CancellationToken, key: &str) -> Result<u64, StorageError> {
        Ok(self.get_metadata(cx, key).await?.size)
    }

    /// Returns a stable address for `key`.
    fn get_url(&self, key: &str) -> Result<String, StorageError>;

    /// Returns an address for `key` that stays valid for `ttl`.
    async fn get_presigned_url(
        &self,
        cx: &CancellationToken,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError>;

    /// Lists every file whose key starts with `prefix`.
    async fn list(&self, cx: &CancellationToken, prefix: &str)
    -> Result<Vec<FileInfo>, StorageError>;

    /// Copies `src` to `dst`.
    async fn copy(&self, cx: &CancellationToken, src: &str, dst: &str)
    -> Result<(), StorageError>;

    /// Moves `src` to `dst` (copy, then delete the source).
    async fn move_file(
        &self,
        cx: &CancellationToken,
        src: &str,
        dst: &str,
    ) -> Result<(), StorageError> {
        self.copy(cx, src, dst).await?;
        self.delete(cx, src).await
    }

    /// Joins key segments with `/`.
    fn join_path(&self, parts: &[&str]) -> String {
        join_key(parts)
    }

    /// Checks `key` against this backend's key rules.
    fn validate_key(&self, key: &str) -> Result<(), StorageError>;
}

/// Joins key segments with `/`, dropping empty segments and stray slashes.
#[must_use]
pub fn join_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Races `fut` against `cx`, preferring cancellation when both are ready.
pub(crate) async fn with_cancel<T, F>(cx: &CancellationToken, fut: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    tokio::select! {
        biased;
        () = cx.cancelled() => Err(StorageError::Canceled),
        res = fut => res,
    }
}
