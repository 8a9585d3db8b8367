//! Provider pool.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use medialib_models::{Format, DEFAULT_CONTEXT};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::MediaProvider;

/// Providers allowed in a context and the formats derived for it.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub providers: Vec<String>,
    pub formats: BTreeMap<String, Format>,
}

/// Process-wide registry of providers and contexts.
///
/// Built once at startup and shared behind an `Arc`.
pub struct Pool {
    providers: HashMap<String, Arc<dyn MediaProvider>>,
    contexts: HashMap<String, Context>,
    default_context: String,
}

impl Default for Pool {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT)
    }
}

impl Pool {
    pub fn new(default_context: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            contexts: HashMap::new(),
            default_context: default_context.into(),
        }
    }

    /// Register a provider under its own name, replacing any previous one.
    pub fn add_provider(&mut self, provider: Arc<dyn MediaProvider>) {
        info!(provider = provider.name(), "Registered media provider");
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn add_context(
        &mut self,
        name: impl Into<String>,
        providers: Vec<String>,
        formats: BTreeMap<String, Format>,
    ) {
        let name = name.into();
        debug!(context = %name, providers = ?providers, formats = formats.len(), "Registered context");
        self.contexts.insert(name, Context { providers, formats });
    }

    pub fn get_provider(&self, name: &str) -> ProviderResult<Arc<dyn MediaProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(name.to_string()))
    }

    pub fn get_context(&self, name: &str) -> ProviderResult<&Context> {
        self.contexts
            .get(name)
            .ok_or_else(|| ProviderError::UnknownContext(name.to_string()))
    }

    pub fn has_context(&self, name: &str) -> bool {
        self.contexts.contains_key(name)
    }

    /// Format names of a context, for pre-populating provider registries.
    pub fn get_format_names_by_context(&self, name: &str) -> ProviderResult<BTreeSet<String>> {
        Ok(self.get_context(name)?.formats.keys().cloned().collect())
    }

    /// Providers allowed in a context; unregistered names are skipped.
    pub fn get_providers_by_context(&self, name: &str) -> ProviderResult<Vec<Arc<dyn MediaProvider>>> {
        Ok(self
            .get_context(name)?
            .providers
            .iter()
            .filter_map(|provider| self.providers.get(provider).cloned())
            .collect())
    }

    pub fn default_context(&self) -> &str {
        &self.default_context
    }

    pub fn provider_names(&self) -> BTreeSet<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Make sure `provider` knows the formats of `context`.
    pub fn register_context_formats(
        &self,
        provider: &dyn MediaProvider,
        context: &str,
    ) -> ProviderResult<()> {
        let registry = provider.base().formats();
        if !registry.has_context(context) {
            registry.register_context(context, self.get_context(context)?.formats.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::DefaultGenerator;
    use crate::provider::{BaseProvider, FileProvider};
    use medialib_cdn::Server;
    use medialib_models::Media;
    use medialib_storage::MemoryFilesystem;

    fn file_provider(name: &str) -> Arc<dyn MediaProvider> {
        Arc::new(FileProvider::new(BaseProvider::new(
            name,
            Arc::new(MemoryFilesystem::new()),
            Arc::new(Server::new("/uploads/media")),
            Arc::new(DefaultGenerator::new()),
        )))
    }

    fn pool() -> Pool {
        let mut pool = Pool::default();
        pool.add_provider(file_provider("file"));

        let mut formats = BTreeMap::new();
        formats.insert("small".to_string(), Format::new(100, 70));
        formats.insert("big".to_string(), Format::new(500, 350));
        pool.add_context(
            "news",
            vec!["file".to_string(), "missing".to_string()],
            formats,
        );
        pool
    }

    #[test]
    fn test_lookup() {
        let pool = pool();
        assert_eq!(pool.default_context(), "default");
        assert_eq!(pool.get_provider("file").unwrap().name(), "file");
        assert!(matches!(
            pool.get_provider("youtube"),
            Err(ProviderError::UnknownProvider(_))
        ));
        assert!(matches!(
            pool.get_format_names_by_context("sport"),
            Err(ProviderError::UnknownContext(_))
        ));

        let names = pool.get_format_names_by_context("news").unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["big", "small"]);
        assert_eq!(pool.get_providers_by_context("news").unwrap().len(), 1);
    }

    #[test]
    fn test_register_context_formats() {
        let pool = pool();
        let provider = pool.get_provider("file").unwrap();

        pool.register_context_formats(provider.as_ref(), "news").unwrap();
        let media = Media::new().with_id(1).with_context("news");
        assert_eq!(
            provider.generate_private_url(&media, "small").unwrap(),
            "news/0001/01/thumb_1_small.jpg"
        );

        assert!(pool
            .register_context_formats(provider.as_ref(), "sport")
            .is_err());
    }
}
