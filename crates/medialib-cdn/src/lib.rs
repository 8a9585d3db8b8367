//! CDN path mapping and cache invalidation.
//!
//! This crate provides:
//! - The [`Cdn`] trait mapping storage keys to public URLs
//! - A static server prefix without invalidation
//! - The Panther Portal SOAP flush client
//! - A fallback router for non-flushable media

pub mod error;
pub mod fallback;
pub mod metrics;
pub mod panther;
pub mod server;

use async_trait::async_trait;

pub use error::{CdnError, CdnResult};
pub use fallback::Fallback;
pub use panther::{PantherConfig, PantherPortal};
pub use server::Server;

/// Content delivery network in front of the media filesystem.
#[async_trait]
pub trait Cdn: Send + Sync {
    /// Map a relative storage key to its public URL.
    ///
    /// `flushable` tells routing CDNs whether the resource may be
    /// invalidated later.
    fn path(&self, relative_path: &str, flushable: bool) -> String;

    /// Invalidate the cached copies of every path in `paths`.
    async fn flush_paths(&self, paths: &[String]) -> CdnResult<()>;

    /// Invalidate a single resource.
    async fn flush(&self, path: &str) -> CdnResult<()> {
        self.flush_paths(&[path.to_string()]).await
    }

    /// Invalidate resources matching a string (wildcards are CDN-specific).
    async fn flush_by_string(&self, pattern: &str) -> CdnResult<()> {
        self.flush_paths(&[pattern.to_string()]).await
    }
}
