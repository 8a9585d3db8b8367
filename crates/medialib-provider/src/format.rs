//! Per-provider format registry.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use medialib_models::{Format, Media, REFERENCE_FORMAT};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Formats {
    /// Formats registered without a context
    common: BTreeMap<String, Format>,
    /// Bulk registrations keyed by context name
    contexts: HashMap<String, BTreeMap<String, Format>>,
}

/// Named formats known to a provider.
///
/// Registration normally happens once at startup; lookups return owned
/// copies so no lock outlives the call.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    inner: RwLock<Formats>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Formats> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Formats> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a context-less format. The reference name is
    /// reserved for the original file and is ignored.
    pub fn add_format(&self, name: impl Into<String>, format: Format) {
        let name = name.into();
        if name == REFERENCE_FORMAT {
            warn!("Ignoring derived format named {}", REFERENCE_FORMAT);
            return;
        }
        debug!(format = %name, "Registering format");
        self.write().common.insert(name, format);
    }

    pub fn get_format(&self, name: &str) -> Option<Format> {
        self.read().common.get(name).cloned()
    }

    /// Context-less formats.
    pub fn get_formats(&self) -> BTreeMap<String, Format> {
        self.read().common.clone()
    }

    /// Upsert the formats of a context.
    pub fn register_context(&self, context: &str, mut formats: BTreeMap<String, Format>) {
        if formats.remove(REFERENCE_FORMAT).is_some() {
            warn!(context, "Ignoring derived format named {}", REFERENCE_FORMAT);
        }
        debug!(context, count = formats.len(), "Registering context formats");
        self.write()
            .contexts
            .entry(context.to_string())
            .or_default()
            .extend(formats);
    }

    pub fn has_context(&self, context: &str) -> bool {
        self.read().contexts.contains_key(context)
    }

    /// Formats derived for media of `context`: the context's own set when
    /// registered, otherwise the context-less set.
    pub fn active_formats(&self, context: &str) -> BTreeMap<String, Format> {
        let formats = self.read();
        formats
            .contexts
            .get(context)
            .unwrap_or(&formats.common)
            .clone()
    }

    pub fn format_names(&self, context: &str) -> BTreeSet<String> {
        self.active_formats(context).into_keys().collect()
    }

    /// Look up a derived format for a media.
    pub fn format_for(&self, media: &Media, name: &str) -> Option<Format> {
        let formats = self.read();
        formats
            .contexts
            .get(media.context_or_default())
            .unwrap_or(&formats.common)
            .get(name)
            .cloned()
    }

    /// Whether `name` is addressable for `media` (derived or the reference).
    pub fn is_addressable(&self, media: &Media, name: &str) -> bool {
        name == REFERENCE_FORMAT || self.format_for(media, name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_format_overwrites() {
        let registry = FormatRegistry::new();
        registry.add_format("big", Format::new(200, 100));
        registry.add_format("big", Format::new(500, 300));

        assert_eq!(registry.get_formats().len(), 1);
        assert_eq!(registry.get_format("big"), Some(Format::new(500, 300)));
    }

    #[test]
    fn test_context_formats_take_precedence() {
        let registry = FormatRegistry::new();
        registry.add_format("admin", Format::with_width(100));

        let mut news = BTreeMap::new();
        news.insert("small".to_string(), Format::new(100, 70));
        news.insert("big".to_string(), Format::new(500, 350));
        registry.register_context("news", news);

        let news_media = Media::new().with_context("news");
        assert!(registry.format_for(&news_media, "small").is_some());
        assert!(registry.format_for(&news_media, "admin").is_none());
        assert_eq!(
            registry.format_names("news").into_iter().collect::<Vec<_>>(),
            vec!["big", "small"]
        );

        let default_media = Media::new();
        assert!(registry.format_for(&default_media, "admin").is_some());
        assert!(!registry.has_context("default"));
    }

    #[test]
    fn test_reference_is_always_addressable() {
        let registry = FormatRegistry::new();
        let media = Media::new();
        assert!(registry.is_addressable(&media, REFERENCE_FORMAT));
        assert!(!registry.is_addressable(&media, "big"));
    }

    #[test]
    fn test_reference_name_is_reserved() {
        let registry = FormatRegistry::new();
        registry.add_format(REFERENCE_FORMAT, Format::new(200, 100));
        assert!(registry.get_formats().is_empty());

        let mut news = BTreeMap::new();
        news.insert(REFERENCE_FORMAT.to_string(), Format::new(200, 100));
        news.insert("small".to_string(), Format::new(100, 70));
        registry.register_context("news", news);

        assert_eq!(
            registry.format_names("news").into_iter().collect::<Vec<_>>(),
            vec!["small"]
        );
    }
}
