//! Media library configuration.
//!
//! Contexts and formats come from a JSON file (`MEDIA_CONFIG_PATH`):
//!
//! ```json
//! {
//!   "default_context": "default",
//!   "contexts": {
//!     "default": {
//!       "providers": ["image", "youtube"],
//!       "formats": { "small": { "width": 100, "quality": 70 } }
//!     }
//!   }
//! }
//! ```
//!
//! Collaborators (storage, CDN, fetch timeouts) come from the environment.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use medialib_cdn::{Cdn, Fallback, PantherPortal, Server};
use medialib_models::{Format, DEFAULT_CONTEXT};
use medialib_storage::{Filesystem, LocalFilesystem, MemoryFilesystem, R2Filesystem};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ProviderError, ProviderResult};
use crate::fetcher::{HttpFetcher, MetadataFetcher};
use crate::generator::{DefaultGenerator, PathGenerator};
use crate::pool::Pool;
use crate::provider::{BaseProvider, FileProvider, ImageProvider, OEmbedProvider, VideoPlatform};
use crate::resizer::{Resizer, SimpleResizer};

/// Context section of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default)]
    pub providers: Vec<String>,
    #[serde(default)]
    pub formats: BTreeMap<String, Format>,
}

/// Contexts and formats of the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_context")]
    pub default_context: String,
    #[serde(default)]
    pub contexts: BTreeMap<String, ContextConfig>,
}

fn default_context() -> String {
    DEFAULT_CONTEXT.to_string()
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            default_context: default_context(),
            contexts: BTreeMap::new(),
        }
    }
}

impl PoolConfig {
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ProviderError::config(format!("invalid media config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ProviderError::config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Load from `MEDIA_CONFIG_PATH`, or a single default context serving
    /// every built-in provider without derived formats.
    pub fn from_env() -> ProviderResult<Self> {
        match std::env::var("MEDIA_CONFIG_PATH") {
            Ok(path) => Self::from_file(path),
            Err(_) => {
                let mut contexts = BTreeMap::new();
                contexts.insert(
                    DEFAULT_CONTEXT.to_string(),
                    ContextConfig {
                        providers: BUILTIN_PROVIDERS.iter().map(|p| p.to_string()).collect(),
                        formats: BTreeMap::new(),
                    },
                );
                Ok(Self {
                    default_context: default_context(),
                    contexts,
                })
            }
        }
    }

    fn validate(&self) -> ProviderResult<()> {
        if !self.contexts.is_empty() && !self.contexts.contains_key(&self.default_context) {
            return Err(ProviderError::config(format!(
                "default context '{}' is not configured",
                self.default_context
            )));
        }

        for (name, context) in &self.contexts {
            for (format_name, format) in &context.formats {
                if format_name == medialib_models::REFERENCE_FORMAT {
                    return Err(ProviderError::config(format!(
                        "context '{}' redefines the reference format",
                        name
                    )));
                }
                if matches!(format.width, Some(0)) || matches!(format.height, Some(0)) {
                    return Err(ProviderError::config(format!(
                        "format '{}.{}' has a zero dimension",
                        name, format_name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Names of the providers [`build_pool`] creates.
pub const BUILTIN_PROVIDERS: [&str; 5] = ["file", "image", "youtube", "vimeo", "dailymotion"];

/// Storage backend selected by `MEDIA_STORAGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Local,
    R2,
}

impl StorageKind {
    pub fn parse(value: &str) -> ProviderResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageKind::Memory),
            "local" => Ok(StorageKind::Local),
            "r2" => Ok(StorageKind::R2),
            other => Err(ProviderError::config(format!("unknown MEDIA_STORAGE: {}", other))),
        }
    }
}

/// Collaborators shared by every provider.
pub struct Collaborators {
    pub filesystem: Arc<dyn Filesystem>,
    pub cdn: Arc<dyn Cdn>,
    pub generator: Arc<dyn PathGenerator>,
    pub resizer: Arc<dyn Resizer>,
    pub fetcher: Arc<dyn MetadataFetcher>,
}

impl Collaborators {
    /// Build collaborators from environment variables.
    ///
    /// The CDN is the static `MEDIA_PUBLIC_PATH` server. When
    /// `PANTHER_USERNAME` is set, flushable media are served from the
    /// Panther Portal `CDN_PATH` instead.
    pub fn from_env() -> ProviderResult<Self> {
        let storage = StorageKind::parse(
            &std::env::var("MEDIA_STORAGE").unwrap_or_else(|_| "local".to_string()),
        )?;

        let filesystem: Arc<dyn Filesystem> = match storage {
            StorageKind::Memory => Arc::new(MemoryFilesystem::new()),
            StorageKind::Local => Arc::new(LocalFilesystem::from_env()),
            StorageKind::R2 => Arc::new(R2Filesystem::from_env()?),
        };

        let server: Arc<dyn Cdn> = Arc::new(Server::from_env());
        let cdn: Arc<dyn Cdn> = if std::env::var("PANTHER_USERNAME").is_ok() {
            Arc::new(Fallback::new(Arc::new(PantherPortal::from_env()?), server))
        } else {
            server
        };

        info!(storage = filesystem.name(), "Configured media collaborators");

        Ok(Self {
            filesystem,
            cdn,
            generator: Arc::new(DefaultGenerator::new()),
            resizer: Arc::new(SimpleResizer::new()),
            fetcher: Arc::new(HttpFetcher::from_env()?),
        })
    }

    fn base(&self, name: &str) -> BaseProvider {
        BaseProvider::new(
            name,
            self.filesystem.clone(),
            self.cdn.clone(),
            self.generator.clone(),
        )
        .with_resizer(self.resizer.clone())
    }
}

/// Create the built-in providers and register the configured contexts.
pub fn build_pool(config: &PoolConfig, collaborators: &Collaborators) -> ProviderResult<Pool> {
    config.validate()?;

    let mut pool = Pool::new(config.default_context.clone());
    pool.add_provider(Arc::new(FileProvider::new(collaborators.base("file"))));
    pool.add_provider(Arc::new(ImageProvider::new(collaborators.base("image"))));
    for platform in [
        VideoPlatform::YouTube,
        VideoPlatform::Vimeo,
        VideoPlatform::Dailymotion,
    ] {
        pool.add_provider(Arc::new(OEmbedProvider::new(
            collaborators.base(platform.name()),
            platform,
            collaborators.fetcher.clone(),
        )));
    }

    for (name, context) in &config.contexts {
        if let Some(unknown) = context
            .providers
            .iter()
            .find(|p| !BUILTIN_PROVIDERS.contains(&p.as_str()))
        {
            return Err(ProviderError::UnknownProvider(unknown.clone()));
        }
        pool.add_context(name.clone(), context.providers.clone(), context.formats.clone());
    }

    Ok(pool)
}
