//! Media providers and their lifecycle.
//!
//! This crate provides:
//! - Sharded path generation for stored media files
//! - Per-provider format registries with context bulk registration
//! - The provider family (file, image, oEmbed videos) behind [`MediaProvider`]
//! - The provider pool and a media manager driving lifecycle hooks
//! - Image resizing and remote metadata fetching collaborators

pub mod config;
pub mod error;
pub mod fetcher;
pub mod format;
pub mod generator;
pub mod manager;
pub mod metrics;
pub mod pool;
pub mod provider;
pub mod resizer;

pub use config::{build_pool, Collaborators, ContextConfig, PoolConfig, StorageKind};
pub use error::{ProviderError, ProviderResult};
pub use fetcher::{FetcherConfig, HttpFetcher, MetadataFetcher};
pub use format::FormatRegistry;
pub use generator::{DefaultGenerator, PathGenerator};
pub use manager::{InMemoryRepository, MediaManager, MediaRepository};
pub use pool::{Context, Pool};
pub use provider::{
    BaseProvider, FileProvider, HelperProperties, ImageProvider, MediaProvider, OEmbedProvider,
    VideoPlatform,
};
pub use resizer::{image_dimensions, Resizer, SimpleResizer};
