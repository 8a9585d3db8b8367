//! Filesystem abstraction used by media providers.

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Key/value binary storage addressed by relative paths
/// (`default/0011/24/thumb_1023457_big.jpg`).
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Read the content stored under `key`.
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Store `data` under `key`, replacing any existing content.
    async fn write(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Check whether `key` exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// Reject keys that could escape the storage root.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::invalid_key(key));
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "..") {
        return Err(StorageError::invalid_key(key));
    }
    Ok(())
}

/// Guess a content type from a key's extension.
pub fn content_type_for(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "mp4" => "video/mp4",
        "flv" => "video/x-flv",
        "doc" => "application/msword",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
