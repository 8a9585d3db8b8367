//! Route flushable media to a primary CDN and the rest to a fallback.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CdnResult;
use crate::Cdn;

/// Flushable resources are served by `cdn`; others by `fallback`.
/// Invalidation always targets the primary CDN.
pub struct Fallback {
    cdn: Arc<dyn Cdn>,
    fallback: Arc<dyn Cdn>,
}

impl Fallback {
    pub fn new(cdn: Arc<dyn Cdn>, fallback: Arc<dyn Cdn>) -> Self {
        Self { cdn, fallback }
    }
}

#[async_trait]
impl Cdn for Fallback {
    fn path(&self, relative_path: &str, flushable: bool) -> String {
        if flushable {
            self.cdn.path(relative_path, flushable)
        } else {
            self.fallback.path(relative_path, flushable)
        }
    }

    async fn flush_paths(&self, paths: &[String]) -> CdnResult<()> {
        self.cdn.flush_paths(paths).await
    }
}
