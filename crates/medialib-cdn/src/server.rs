//! Static CDN prefix.

use async_trait::async_trait;
use tracing::debug;

use crate::error::CdnResult;
use crate::Cdn;

/// Public files served from a fixed base path; flushing is a no-op.
#[derive(Debug, Clone)]
pub struct Server {
    path: String,
}

impl Server {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Create from `MEDIA_PUBLIC_PATH` (defaults to `/uploads/media`).
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("MEDIA_PUBLIC_PATH").unwrap_or_else(|_| "/uploads/media".to_string()),
        )
    }
}

#[async_trait]
impl Cdn for Server {
    fn path(&self, relative_path: &str, _flushable: bool) -> String {
        format!("{}/{}", self.path, relative_path)
    }

    async fn flush_paths(&self, paths: &[String]) -> CdnResult<()> {
        debug!(count = paths.len(), "Static server has no cache to flush");
        Ok(())
    }
}
