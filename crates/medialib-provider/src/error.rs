//! Provider error types.

use medialib_cdn::CdnError;
use medialib_models::ReferenceError;
use medialib_storage::StorageError;
use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised by providers, the pool and the media manager.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Operation requires state the media does not have (usually an id)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Missing metadata: {0}")]
    MissingMetadata(String),

    /// Remote metadata or thumbnail could not be fetched
    #[error("Fetch failed: {0}")]
    FetchFailure(String),

    #[error("Resize failed: {0}")]
    ResizeFailure(String),

    #[error("CDN error: {0}")]
    Cdn(#[from] CdnError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Unknown context: {0}")]
    UnknownContext(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Repository error: {0}")]
    Repository(String),

    /// Thumbnail generation stopped at `format`; `completed` were written.
    #[error("Thumbnail '{format}' failed after {} completed: {source}", .completed.len())]
    Thumbnails {
        completed: Vec<String>,
        format: String,
        source: Box<ProviderError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn missing_metadata(key: impl Into<String>) -> Self {
        Self::MissingMetadata(key.into())
    }

    pub fn fetch_failure(msg: impl Into<String>) -> Self {
        Self::FetchFailure(msg.into())
    }

    pub fn resize_failure(msg: impl Into<String>) -> Self {
        Self::ResizeFailure(msg.into())
    }

    pub fn invalid_reference(msg: impl Into<String>) -> Self {
        Self::InvalidReference(msg.into())
    }

    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Formats written before the failure, for partial thumbnail runs.
    pub fn completed_formats(&self) -> &[String] {
        match self {
            ProviderError::Thumbnails { completed, .. } => completed,
            _ => &[],
        }
    }

    /// The CDN refused a flush because of its hourly quota.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::Cdn(e) if e.is_rate_limited())
    }
}

impl From<ReferenceError> for ProviderError {
    fn from(err: ReferenceError) -> Self {
        Self::InvalidReference(err.to_string())
    }
}
