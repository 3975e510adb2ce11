//! Storage configuration types.

use std::path::PathBuf;
use std::time::Duration;

use repgen_shared::config::{StorageBackendKind, StorageSettings};
use serde::{Deserialize, Serialize};

use super::error::StorageError;

/// Storage provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProvider {
    /// S3-compatible storage: AWS S3, MinIO, Cloudflare R2
    S3 {
        /// S3 endpoint URL. Empty means AWS.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// AWS access key ID.
        access_key_id: String,
        /// AWS secret access key.
        secret_access_key: String,
        /// AWS region.
        region: String,
    },
    /// Local filesystem
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
}

impl StorageProvider {
    /// Create S3-compatible provider.
    #[must_use]
    pub fn s3(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self::S3 {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
        }
    }

    /// Create local filesystem provider.
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self::LocalFs { root: root.into() }
    }

    /// Get the provider name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::LocalFs { .. } => "local",
        }
    }

    /// Checks that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Configuration`] naming the first missing field.
    pub fn validate(&self) -> Result<(), StorageError> {
        match self {
            Self::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                region,
                ..
            } => {
                let required = [
                    ("bucket", bucket),
                    ("region", region),
                    ("access_key_id", access_key_id),
                    ("secret_access_key", secret_access_key),
                ];
                for (field, value) in required {
                    if value.trim().is_empty() {
                        return Err(StorageError::configuration(format!(
                            "s3 {field} is required"
                        )));
                    }
                }
                Ok(())
            }
            Self::LocalFs { root } => {
                if root.as_os_str().is_empty() {
                    return Err(StorageError::configuration("local root path is required"));
                }
                Ok(())
            }
        }
    }
}

/// Storage chain configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage provider configuration.
    pub provider: StorageProvider,
    /// Retries after the first failed attempt of save/get/delete.
    pub max_retries: u32,
    /// Pause between retry attempts.
    pub retry_delay: Duration,
    /// Lifetime of presigned download URLs.
    pub presign_ttl: Duration,
}

impl StorageConfig {
    /// Default retry count.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    /// Default delay between retries: 1 second.
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
    /// Default presigned URL lifetime: 1 hour.
    pub const DEFAULT_PRESIGN_TTL: Duration = Duration::from_secs(3600);

    /// Create a new storage config with defaults.
    #[must_use]
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            retry_delay: Self::DEFAULT_RETRY_DELAY,
            presign_ttl: Self::DEFAULT_PRESIGN_TTL,
        }
    }

    /// Set retry count.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the delay between retries.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set presigned URL lifetime.
    #[must_use]
    pub fn with_presign_ttl(mut self, ttl: Duration) -> Self {
        self.presign_ttl = ttl;
        self
    }

    /// Builds a storage config from the application settings section.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `backend = "s3"` has no `s3` section
    /// or a required provider field is missing.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        let provider = match settings.backend {
            StorageBackendKind::Local => StorageProvider::local_fs(&settings.local_root),
            StorageBackendKind::S3 => {
                let s3 = settings.s3.as_ref().ok_or_else(|| {
                    StorageError::configuration("storage.s3 section is required for the s3 backend")
                })?;
                StorageProvider::s3(
                    &s3.endpoint,
                    &s3.bucket,
                    &s3.access_key_id,
                    &s3.secret_access_key,
                    &s3.region,
                )
            }
        };
        provider.validate()?;

        Ok(Self::new(provider)
            .with_max_retries(settings.max_retries)
            .with_retry_delay(Duration::from_millis(settings.retry_delay_ms))
            .with_presign_ttl(Duration::from_secs(settings.presign_ttl_secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repgen_shared::config::S3Settings;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::new(StorageProvider::local_fs("./data"));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.provider.name(), "local");
    }

    #[test]
    fn test_s3_validation_requires_credentials() {
        let provider = StorageProvider::s3("", "reports", "", "secret", "us-east-1");
        let err = provider.validate().unwrap_err();
        assert!(err.to_string().contains("access_key_id"));

        let provider = StorageProvider::s3("", "reports", "key", "secret", "us-east-1");
        assert!(provider.validate().is_ok());
    }

    #[test]
    fn test_local_validation_requires_root() {
        assert!(StorageProvider::local_fs("").validate().is_err());
        assert!(StorageProvider::local_fs("/tmp/reports").validate().is_ok());
    }

    #[test]
    fn test_from_settings_s3_without_section_fails() {
        let settings = StorageSettings {
            backend: StorageBackendKind::S3,
            ..StorageSettings::default()
        };
        assert!(matches!(
            StorageConfig::from_settings(&settings),
            Err(StorageError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_settings_maps_retry_policy() {
        let settings = StorageSettings {
            backend: StorageBackendKind::S3,
            s3: Some(S3Settings {
                endpoint: "http://localhost:9000".into(),
                bucket: "reports".into(),
                region: "us-east-1".into(),
                access_key_id: "minio".into(),
                secret_access_key: "minio123".into(),
            }),
            max_retries: 5,
            retry_delay_ms: 250,
            ..StorageSettings::default()
        };
        let config = StorageConfig::from_settings(&settings).expect("valid settings");
        assert_eq!(config.provider.name(), "s3");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
    }
}
