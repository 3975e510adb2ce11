//! Operations shared by the OpenDAL-backed storages.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use opendal::{ErrorKind, Metadata, Operator};
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tokio_util::sync::CancellationToken;

use super::error::StorageError;
use super::types::{FileInfo, FileMetadata, FileReader};
use super::with_cancel;

/// Thin wrapper over an OpenDAL [`Operator`] that maps errors per key and
/// honours cancellation.
#[derive(Clone)]
pub(crate) struct OpendalStore {
    op: Operator,
}

impl OpendalStore {
    pub(crate) fn new(op: Operator) -> Self {
        Self { op }
    }

    pub(crate) async fn save(
        &self,
        cx: &CancellationToken,
        key: &str,
        data: Bytes,
    ) -> Result<(), StorageError> {
        with_cancel(cx, async {
            self.op
                .write(key, data)
                .await
                .map(|_| ())
                .map_err(|e| StorageError::from_opendal(key, &e))
        })
        .await
    }

    pub(crate) async fn get(
        &self,
        cx: &CancellationToken,
        key: &str,
    ) -> Result<FileReader, StorageError> {
        let reader = with_cancel(cx, async {
            let reader = self
                .op
                .reader(key)
                .await
                .map_err(|e| StorageError::from_opendal(key, &e))?;
            reader
                .into_futures_async_read(..)
                .await
                .map_err(|e| StorageError::from_opendal(key, &e))
        })
        .await?;

        Ok(Box::new(reader.compat()))
    }

    pub(crate) async fn delete(&self, cx: &CancellationToken, key: &str) -> Result<(), StorageError> {
        with_cancel(cx, async {
            match self.op.delete(key).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StorageError::from_opendal(key, &e)),
            }
        })
        .await
    }

    pub(crate) async fn exists(
        &self,
        cx: &CancellationToken,
        key: &str,
    ) -> Result<bool, StorageError> {
        with_cancel(cx, async {
            match self.op.stat(key).await {
                Ok(_) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(StorageError::from_opendal(key, &e)),
            }
        })
        .await
    }

    pub(crate) async fn metadata(
        &self,
        cx: &CancellationToken,
        key: &str,
    ) -> Result<FileMetadata, StorageError> {
        let meta = with_cancel(cx, async {
            self.op
                .stat(key)
                .await
                .map_err(|e| StorageError::from_opendal(key, &e))
        })
        .await?;

        Ok(to_file_metadata(key, &meta))
    }

    pub(crate) async fn presign_read(
        &self,
        cx: &CancellationToken,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        with_cancel(cx, async {
            self.op
                .presign_read(key, ttl)
                .await
                .map(|req| req.uri().to_string())
                .map_err(|e| StorageError::from_opendal(key, &e))
        })
        .await
    }

    /// Lists the directory containing `prefix` recursively and keeps the
    /// files whose key starts with `prefix`.
    pub(crate) async fn list(
        &self,
        cx: &CancellationToken,
        prefix: &str,
    ) -> Result<Vec<FileInfo>, StorageError> {
        let dir = match prefix.rfind('/') {
            Some(idx) => &prefix[..=idx],
            None => "/",
        };

        with_cancel(cx, async {
            let entries = match self.op.list_with(dir).recursive(true).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(StorageError::from_opendal(dir, &e)),
            };

            let mut files = Vec::new();
            for entry in entries {
                let path = entry.path().trim_start_matches('/');
                if !entry.metadata().mode().is_file() || !path.starts_with(prefix) {
                    continue;
                }
                let meta = self
                    .op
                    .stat(path)
                    .await
                    .map_err(|e| StorageError::from_opendal(path, &e))?;
                files.push(FileInfo::from(to_file_metadata(path, &meta)));
            }
            files.sort_by(|a, b| a.key.cmp(&b.key));
            Ok(files)
        })
        .await
    }

    pub(crate) async fn copy(
        &self,
        cx: &CancellationToken,
        src: &str,
        dst: &str,
    ) -> Result<(), StorageError> {
        with_cancel(cx, async {
            self.op
                .copy(src, dst)
                .await
                .map_err(|e| StorageError::from_opendal(src, &e))
        })
        .await
    }
}

fn to_file_metadata(key: &str, meta: &Metadata) -> FileMetadata {
    FileMetadata {
        key: key.to_string(),
        size: meta.content_length(),
        last_modified: meta
            .last_modified()
            .and_then(|t| parse_timestamp(&t.to_string())),
        content_type: meta.content_type().map(String::from),
        etag: meta.etag().map(String::from),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| raw.parse::<DateTime<Utc>>().ok())
}
