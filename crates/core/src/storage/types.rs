//! Storage value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Readable stream returned by [`Storage::get`](super::Storage::get).
///
/// The OpenDAL backends read lazily in chunks; dropping the reader stops
/// the transfer.
pub type FileReader = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

/// Metadata for a single stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Storage key.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, when the backend reports it.
    pub last_modified: Option<DateTime<Utc>>,
    /// MIME type, when the backend reports it.
    pub content_type: Option<String>,
    /// Entity tag, when the backend reports it.
    pub etag: Option<String>,
}

/// One entry returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Storage key.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, when the backend reports it.
    pub last_modified: Option<DateTime<Utc>>,
}

impl From<FileMetadata> for FileInfo {
    fn from(meta: FileMetadata) -> Self {
        Self {
            key: meta.key,
            size: meta.size,
            last_modified: meta.last_modified,
        }
    }
}
