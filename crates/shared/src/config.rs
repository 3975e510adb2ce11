//! Application configuration management.
//!
//! Values are layered from `config/default.toml`, `config/{RUN_MODE}.toml`
//! and finally `REPGEN__*` environment variables (for example
//! `REPGEN__STORAGE__BACKEND=s3`).

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Object storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Background processor configuration.
    #[serde(default)]
    pub processor: ProcessorSettings,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Which object storage backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// Local filesystem rooted at [`StorageSettings::local_root`].
    #[default]
    Local,
    /// S3-compatible object store.
    S3,
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Backend selector.
    #[serde(default)]
    pub backend: StorageBackendKind,
    /// Root directory for the local backend.
    #[serde(default = "default_local_root")]
    pub local_root: String,
    /// S3 connection settings, required when `backend = "s3"`.
    #[serde(default)]
    pub s3: Option<S3Settings>,
    /// Retries after the first failed save/get/delete attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed pause between retry attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Lifetime of presigned download URLs, in seconds.
    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            local_root: default_local_root(),
            s3: None,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            presign_ttl_secs: default_presign_ttl_secs(),
        }
    }
}

fn default_local_root() -> String {
    "./data/reports".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_presign_ttl_secs() -> u64 {
    3600
}

/// S3 connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Settings {
    /// Custom endpoint (MinIO, R2). Empty means AWS.
    #[serde(default)]
    pub endpoint: String,
    /// Bucket name.
    pub bucket: String,
    /// Region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Access key ID.
    #[serde(default)]
    pub access_key_id: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_access_key: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Background processor configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ProcessorSettings {
    /// Number of tasks the queue holds before rejecting submissions.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Default per-task deadline, in seconds.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            task_timeout_secs: default_task_timeout_secs(),
        }
    }
}

fn default_queue_capacity() -> usize {
    100
}

fn default_task_timeout_secs() -> u64 {
    30 * 60
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("REPGEN").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_applies_defaults() {
        temp_env::with_vars(
            [
                ("REPGEN__DATABASE__URL", Some("postgres://localhost/repgen")),
                ("RUN_MODE", Some("test-nonexistent")),
            ],
            || {
                let config = AppConfig::load().expect("config loads");
                assert_eq!(config.database.url, "postgres://localhost/repgen");
                assert_eq!(config.database.max_connections, 10);
                assert_eq!(config.storage.backend, StorageBackendKind::Local);
                assert_eq!(config.storage.max_retries, 3);
                assert_eq!(config.storage.retry_delay_ms, 1000);
                assert!(config.storage.s3.is_none());
                assert_eq!(config.processor.queue_capacity, 100);
                assert_eq!(config.processor.task_timeout_secs, 1800);
            },
        );
    }

    #[test]
    fn test_load_reads_nested_env_overrides() {
        temp_env::with_vars(
            [
                ("REPGEN__DATABASE__URL", Some("postgres://db/repgen")),
                ("REPGEN__STORAGE__BACKEND", Some("s3")),
                ("REPGEN__STORAGE__S3__BUCKET", Some("reports")),
                ("REPGEN__PROCESSOR__QUEUE_CAPACITY", Some("5")),
                ("RUN_MODE", Some("test-nonexistent")),
            ],
            || {
                let config = AppConfig::load().expect("config loads");
                assert_eq!(config.storage.backend, StorageBackendKind::S3);
                let s3 = config.storage.s3.expect("s3 section");
                assert_eq!(s3.bucket, "reports");
                assert_eq!(s3.region, "us-east-1");
                assert_eq!(config.processor.queue_capacity, 5);
            },
        );
    }

    #[test]
    fn test_load_fails_without_database_url() {
        temp_env::with_vars(
            [
                ("REPGEN__DATABASE__URL", None::<&str>),
                ("RUN_MODE", Some("test-nonexistent")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }
}
