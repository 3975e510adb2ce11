//! S3-compatible object store backend.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use opendal::{Operator, services};
use tokio_util::sync::CancellationToken;

use super::backend::OpendalStore;
use super::config::StorageProvider;
use super::error::StorageError;
use super::types::{FileInfo, FileMetadata, FileReader};
use super::Storage;

/// Longest key accepted by S3.
pub const MAX_S3_KEY_LEN: usize = 1024;

/// Stores files in an S3 bucket (AWS S3, MinIO, Cloudflare R2).
pub struct S3Storage {
    bucket: String,
    endpoint: String,
    store: OpendalStore,
}

impl S3Storage {
    /// Creates an S3 storage from a provider config.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a non-S3 provider, a missing
    /// required field, or an operator that cannot be built.
    pub fn new(provider: &StorageProvider) -> Result<Self, StorageError> {
        provider.validate()?;
        let StorageProvider::S3 {
            endpoint,
            bucket,
            access_key_id,
            secret_access_key,
            region,
        } = provider
        else {
            return Err(StorageError::configuration(
                "S3Storage requires an s3 provider",
            ));
        };

        let mut builder = services::S3::default()
            .bucket(bucket)
            .access_key_id(access_key_id)
            .secret_access_key(secret_access_key)
            .region(region);
        if !endpoint.is_empty() {
            builder = builder.endpoint(endpoint);
        }

        let op = Operator::new(builder)
            .map_err(|e| StorageError::configuration(e.to_string()))?
            .finish();

        Ok(Self {
            bucket: bucket.clone(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            store: OpendalStore::new(op),
        })
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl Storage for S3Storage {
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
        Ok(object_url(&self.endpoint, &self.bucket, key))
    }

    async fn get_presigned_url(
        &self,
        cx: &CancellationToken,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        self.store.presign_read(cx, key, ttl).await
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
        validate_s3_key(key)
    }
}

/// Rejects empty keys and keys longer than [`MAX_S3_KEY_LEN`].
pub(crate) fn validate_s3_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::EmptyKey);
    }
    if key.len() > MAX_S3_KEY_LEN {
        return Err(StorageError::KeyTooLong {
            len: key.len(),
            max: MAX_S3_KEY_LEN,
        });
    }
    Ok(())
}

fn object_url(endpoint: &str, bucket: &str, key: &str) -> String {
    if endpoint.is_empty() {
        format!("https://{bucket}.s3.amazonaws.com/{key}")
    } else {
        format!("{endpoint}/{bucket}/{key}")
    }
}
