//! Media providers.
//!
//! A provider handles one media kind. Variants implement [`MediaProvider`]
//! on top of a shared [`BaseProvider`] holding the collaborators, the format
//! registry and the path generator. The lifecycle hooks have default
//! implementations expressing the common state machine:
//!
//! | Hook | Default behaviour |
//! |---|---|
//! | `pre_persist` | process binary content if present, status `ok` (or `error` on failure) |
//! | `post_persist` | store the upload and derive thumbnails unless the status is sticky |
//! | `pre_update` | re-process new content, otherwise normalize `pending`/`sending` to `ok` |
//! | `post_update` | same as `post_persist` |
//! | `pre_remove` | nothing |
//! | `post_remove` | delete reference and derived files, flush them from the CDN |

mod file;
mod image;
mod oembed;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use medialib_cdn::Cdn;
use medialib_models::{BinaryContent, Format, Media, MediaId, ProviderStatus, REFERENCE_FORMAT};
use medialib_storage::{content_type_for, Filesystem};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::format::FormatRegistry;
use crate::generator::PathGenerator;
use crate::metrics::{record_lifecycle, record_thumbnail};
use crate::resizer::Resizer;

pub use self::file::FileProvider;
pub use self::image::ImageProvider;
pub use self::oembed::{OEmbedProvider, VideoPlatform};

/// Display properties handed to presentation layers.
pub type HelperProperties = Map<String, Value>;

// ============================================================================
// Shared state
// ============================================================================

/// State shared by every provider variant.
pub struct BaseProvider {
    name: String,
    filesystem: Arc<dyn Filesystem>,
    cdn: Arc<dyn Cdn>,
    generator: Arc<dyn PathGenerator>,
    formats: FormatRegistry,
    resizer: Option<Arc<dyn Resizer>>,
}

impl BaseProvider {
    pub fn new(
        name: impl Into<String>,
        filesystem: Arc<dyn Filesystem>,
        cdn: Arc<dyn Cdn>,
        generator: Arc<dyn PathGenerator>,
    ) -> Self {
        Self {
            name: name.into(),
            filesystem,
            cdn,
            generator,
            formats: FormatRegistry::new(),
            resizer: None,
        }
    }

    pub fn with_resizer(mut self, resizer: Arc<dyn Resizer>) -> Self {
        self.resizer = Some(resizer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filesystem(&self) -> &dyn Filesystem {
        self.filesystem.as_ref()
    }

    pub fn cdn(&self) -> &dyn Cdn {
        self.cdn.as_ref()
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    pub fn resizer(&self) -> ProviderResult<&dyn Resizer> {
        self.resizer
            .as_deref()
            .ok_or_else(|| ProviderError::config(format!("provider {} has no resizer", self.name)))
    }

    pub fn generate_path(&self, media: &Media) -> ProviderResult<String> {
        self.generator.generate_path(media)
    }

    /// Formats derived for `media`, copied out of the registry.
    pub fn active_formats(&self, media: &Media) -> BTreeMap<String, Format> {
        self.formats.active_formats(media.context_or_default())
    }

    /// `{path}/thumb_{id}_{format}.{ext}`
    pub fn thumbnail_key(
        &self,
        media: &Media,
        format_name: &str,
        format: &Format,
    ) -> ProviderResult<String> {
        let path = self.generate_path(media)?;
        Ok(format!(
            "{}/thumb_{}_{}.{}",
            path,
            require_id(media)?,
            format_name,
            format.extension()
        ))
    }

    /// Display box of `media` rendered in `format_name`.
    ///
    /// Known media dimensions are fitted into the format; otherwise the
    /// format's declared dimensions are used as is.
    pub fn box_for(
        &self,
        media: &Media,
        format_name: &str,
    ) -> ProviderResult<(Option<u32>, Option<u32>)> {
        if format_name == REFERENCE_FORMAT {
            return Ok((media.width, media.height));
        }

        let format = self
            .formats
            .format_for(media, format_name)
            .ok_or_else(|| ProviderError::UnknownFormat(format_name.to_string()))?;

        Ok(match (media.width, media.height) {
            (Some(width), Some(height)) => {
                let (w, h) = format.box_for(width, height);
                (Some(w), Some(h))
            }
            _ => (format.width, format.height),
        })
    }
}

pub(crate) fn require_id(media: &Media) -> ProviderResult<MediaId> {
    media
        .id
        .ok_or_else(|| ProviderError::invalid_state("media has not been persisted"))
}

/// Copy `overrides` over computed properties.
pub(crate) fn apply_overrides(properties: &mut HelperProperties, overrides: &HelperProperties) {
    for (key, value) in overrides {
        properties.insert(key.clone(), value.clone());
    }
}

// ============================================================================
// Provider capability
// ============================================================================

/// Strategy handling storage, URLs and lifecycle of one media kind.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    fn base(&self) -> &BaseProvider;

    fn name(&self) -> &str {
        self.base().name()
    }

    fn add_format(&self, name: &str, format: Format) {
        self.base().formats().add_format(name, format);
    }

    fn get_formats(&self) -> BTreeMap<String, Format> {
        self.base().formats().get_formats()
    }

    fn generate_path(&self, media: &Media) -> ProviderResult<String> {
        self.base().generate_path(media)
    }

    /// Storage key of the reference file.
    fn reference_key(&self, media: &Media) -> ProviderResult<String>;

    /// Storage key of `format_name` (derived format or the reference).
    fn generate_private_url(&self, media: &Media, format_name: &str) -> ProviderResult<String> {
        if format_name == REFERENCE_FORMAT {
            return self.reference_key(media);
        }

        let format = self
            .base()
            .formats()
            .format_for(media, format_name)
            .ok_or_else(|| ProviderError::UnknownFormat(format_name.to_string()))?;
        self.base().thumbnail_key(media, format_name, &format)
    }

    /// Public URL of `format_name`, routed through the CDN.
    fn generate_public_url(&self, media: &Media, format_name: &str) -> ProviderResult<String> {
        let key = self.generate_private_url(media, format_name)?;
        Ok(self.base().cdn().path(&key, media.cdn_is_flushable))
    }

    fn require_thumbnails(&self, media: &Media) -> bool;

    /// Location of the image thumbnails are rendered from.
    fn get_reference_image(&self, media: &Media) -> ProviderResult<String>;

    /// Bytes of the reference image. Defaults to the stored reference file.
    async fn reference_image_bytes(&self, media: &Media) -> ProviderResult<Vec<u8>> {
        let key = self.reference_key(media)?;
        Ok(self.base().filesystem().read(&key).await?)
    }

    /// Render every active format. Returns the generated format names.
    async fn generate_thumbnails(&self, media: &Media) -> ProviderResult<Vec<String>> {
        let names: Vec<String> = self.base().active_formats(media).into_keys().collect();
        self.generate_formats(media, &names).await
    }

    /// Render the named formats in order, stopping at the first failure.
    ///
    /// Runs are not atomic: on failure, [`ProviderError::Thumbnails`] lists
    /// the formats already written.
    async fn generate_formats(&self, media: &Media, names: &[String]) -> ProviderResult<Vec<String>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let base = self.base();
        let resizer = base.resizer()?;
        let source = self.reference_image_bytes(media).await?;
        let mut completed = Vec::with_capacity(names.len());

        for name in names {
            let result: ProviderResult<String> = async {
                let format = base
                    .formats()
                    .format_for(media, name)
                    .ok_or_else(|| ProviderError::UnknownFormat(name.clone()))?;
                let key = base.thumbnail_key(media, name, &format)?;
                let bytes = resizer.resize(&source, &format).await?;
                base.filesystem()
                    .write(&key, bytes, content_type_for(&key))
                    .await?;
                Ok(key)
            }
            .await;

            match result {
                Ok(key) => {
                    record_thumbnail(self.name(), true);
                    debug!(provider = self.name(), format = %name, "Generated {}", key);
                    completed.push(name.clone());
                }
                Err(e) => {
                    record_thumbnail(self.name(), false);
                    warn!(
                        media_id = media.id.map(|id| id.get()),
                        provider = self.name(),
                        format = %name,
                        error = %e,
                        "Thumbnail generation failed"
                    );
                    return Err(ProviderError::Thumbnails {
                        completed,
                        format: name.clone(),
                        source: Box::new(e),
                    });
                }
            }
        }

        info!(
            media_id = media.id.map(|id| id.get()),
            provider = self.name(),
            count = completed.len(),
            "Generated thumbnails"
        );
        Ok(completed)
    }

    fn get_helper_properties(
        &self,
        media: &Media,
        format_name: &str,
        overrides: &HelperProperties,
    ) -> ProviderResult<HelperProperties>;

    /// Apply uploaded content to the media (reference, name, metadata).
    async fn transform(&self, media: &mut Media, content: &BinaryContent) -> ProviderResult<()>;

    /// Whether binary content must survive `transform` to be written by
    /// [`MediaProvider::store_upload`].
    fn stores_upload(&self) -> bool {
        false
    }

    /// Write retained upload content to the filesystem.
    async fn store_upload(&self, _media: &mut Media) -> ProviderResult<()> {
        Ok(())
    }

    async fn pre_persist(&self, media: &mut Media) -> ProviderResult<()> {
        process_binary_content(self, media, "pre_persist").await?;
        Ok(())
    }

    async fn post_persist(&self, media: &mut Media) -> ProviderResult<()> {
        derive_files(self, media).await
    }

    async fn pre_update(&self, media: &mut Media) -> ProviderResult<()> {
        if process_binary_content(self, media, "pre_update").await? {
            return Ok(());
        }

        let status = media.provider_status.normalized_for_update();
        if status != media.provider_status {
            debug!(
                media_id = media.id.map(|id| id.get()),
                from = %media.provider_status,
                to = %status,
                "Normalizing provider status"
            );
            media.provider_status = status;
        }
        media.touch();
        Ok(())
    }

    async fn post_update(&self, media: &mut Media) -> ProviderResult<()> {
        derive_files(self, media).await
    }

    async fn pre_remove(&self, _media: &mut Media) -> ProviderResult<()> {
        Ok(())
    }

    async fn post_remove(&self, media: &mut Media) -> ProviderResult<()> {
        let keys = self.derived_keys(media)?;
        for key in &keys {
            self.base().filesystem().delete(key).await?;
        }

        self.base().cdn().flush_paths(&keys).await?;
        media.cdn_flush_at = Some(Utc::now());

        info!(
            media_id = media.id.map(|id| id.get()),
            provider = self.name(),
            files = keys.len(),
            "Removed media files"
        );
        Ok(())
    }

    /// Storage keys of the reference and every active derived file.
    fn derived_keys(&self, media: &Media) -> ProviderResult<Vec<String>> {
        let mut keys = Vec::new();
        match self.reference_key(media) {
            Ok(key) => keys.push(key),
            // Nothing was ever stored
            Err(ProviderError::MissingMetadata(_)) => {}
            Err(e) => return Err(e),
        }

        if self.require_thumbnails(media) {
            for (name, format) in self.base().active_formats(media) {
                keys.push(self.base().thumbnail_key(media, &name, &format)?);
            }
        }
        Ok(keys)
    }

    /// Active formats whose derived file is absent from the filesystem.
    async fn missing_thumbnails(&self, media: &Media) -> ProviderResult<Vec<String>> {
        if !self.require_thumbnails(media) {
            return Ok(Vec::new());
        }

        let mut missing = Vec::new();
        for (name, format) in self.base().active_formats(media) {
            let key = self.base().thumbnail_key(media, &name, &format)?;
            if !self.base().filesystem().exists(&key).await? {
                missing.push(name);
            }
        }
        Ok(missing)
    }
}

// ============================================================================
// Lifecycle helpers
// ============================================================================

/// Run `transform` on pending binary content.
///
/// Returns `false` when there was nothing to process. On failure the
/// status becomes `error` and the content is kept for a retry.
async fn process_binary_content<P>(
    provider: &P,
    media: &mut Media,
    hook: &'static str,
) -> ProviderResult<bool>
where
    P: MediaProvider + ?Sized,
{
    let Some(content) = media.binary_content.take() else {
        debug!(provider = provider.name(), hook, "No binary content");
        return Ok(false);
    };

    match provider.transform(media, &content).await {
        Ok(()) => {
            media.provider_status = ProviderStatus::Ok;
            if provider.stores_upload() {
                media.binary_content = Some(content);
            }
            media.touch();
            record_lifecycle(provider.name(), hook, true);
            info!(
                media_id = media.id.map(|id| id.get()),
                provider = provider.name(),
                reference = media.provider_reference.as_deref().unwrap_or_default(),
                hook,
                "Processed binary content"
            );
            Ok(true)
        }
        Err(e) => {
            media.provider_status = ProviderStatus::Error;
            media.binary_content = Some(content);
            record_lifecycle(provider.name(), hook, false);
            warn!(
                media_id = media.id.map(|id| id.get()),
                provider = provider.name(),
                hook,
                error = %e,
                "Failed to process binary content"
            );
            Err(e)
        }
    }
}

/// Store the upload and derive thumbnails, unless the status is sticky.
async fn derive_files<P>(provider: &P, media: &mut Media) -> ProviderResult<()>
where
    P: MediaProvider + ?Sized,
{
    if media.provider_status.is_sticky() {
        debug!(
            media_id = media.id.map(|id| id.get()),
            status = %media.provider_status,
            "Skipping derived files"
        );
        return Ok(());
    }

    provider.store_upload(media).await?;
    if provider.require_thumbnails(media) {
        provider.generate_thumbnails(media).await?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::generator::DefaultGenerator;
    use medialib_cdn::Server;
    use medialib_storage::MemoryFilesystem;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Resizer copying the source; fails on formats with the `fail_on` box.
    pub(crate) struct StubResizer {
        pub(crate) fail_on: Option<(u32, u32)>,
        pub(crate) calls: AtomicUsize,
    }

    impl StubResizer {
        pub(crate) fn ok() -> Arc<Self> {
            Arc::new(Self {
                fail_on: None,
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn failing_on(width: u32, height: u32) -> Arc<Self> {
            Arc::new(Self {
                fail_on: Some((width, height)),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Resizer for StubResizer {
        async fn resize(&self, source: &[u8], format: &Format) -> ProviderResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match (self.fail_on, format.width, format.height) {
                (Some((w, h)), Some(fw), Some(fh)) if w == fw && h == fh => {
                    Err(ProviderError::resize_failure("stub failure"))
                }
                _ => Ok(source.to_vec()),
            }
        }
    }

    /// Provider whose reference lives at `{path}/ref.bin`.
    struct StaticProvider {
        base: BaseProvider,
        fail_transform: bool,
    }

    #[async_trait]
    impl MediaProvider for StaticProvider {
        fn base(&self) -> &BaseProvider {
            &self.base
        }

        fn reference_key(&self, media: &Media) -> ProviderResult<String> {
            Ok(format!("{}/ref.bin", self.generate_path(media)?))
        }

        fn require_thumbnails(&self, _media: &Media) -> bool {
            true
        }

        fn get_reference_image(&self, media: &Media) -> ProviderResult<String> {
            self.reference_key(media)
        }

        fn get_helper_properties(
            &self,
            media: &Media,
            format_name: &str,
            overrides: &HelperProperties,
        ) -> ProviderResult<HelperProperties> {
            let (width, height) = self.base.box_for(media, format_name)?;
            let mut properties = HelperProperties::new();
            properties.insert("width".into(), width.into());
            properties.insert("height".into(), height.into());
            apply_overrides(&mut properties, overrides);
            Ok(properties)
        }

        async fn transform(&self, media: &mut Media, _content: &BinaryContent) -> ProviderResult<()> {
            if self.fail_transform {
                return Err(ProviderError::fetch_failure("offline"));
            }
            media.provider_reference = Some("static".into());
            Ok(())
        }
    }

    fn provider(resizer: Arc<StubResizer>, fail_transform: bool) -> (StaticProvider, Arc<MemoryFilesystem>) {
        let fs = Arc::new(MemoryFilesystem::new());
        let base = BaseProvider::new(
            "static",
            fs.clone(),
            Arc::new(Server::new("https://cdn.example.com")),
            Arc::new(DefaultGenerator::new()),
        )
        .with_resizer(resizer);
        (StaticProvider { base, fail_transform }, fs)
    }

    #[test]
    fn test_public_and_private_urls_share_suffix() {
        let (provider, _) = provider(StubResizer::ok(), false);
        provider.add_format("big", Format::new(500, 300));
        let media = Media::new().with_id(1023457);

        let private = provider.generate_private_url(&media, "big").unwrap();
        let public = provider.generate_public_url(&media, "big").unwrap();
        assert_eq!(private, "default/0011/24/thumb_1023457_big.jpg");
        assert!(public.starts_with("https://cdn.example.com/"));
        assert!(public.ends_with(&private));

        assert_eq!(
            provider.generate_private_url(&media, REFERENCE_FORMAT).unwrap(),
            "default/0011/24/ref.bin"
        );
        assert!(matches!(
            provider.generate_public_url(&media, "small"),
            Err(ProviderError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_urls_require_id() {
        let (provider, _) = provider(StubResizer::ok(), false);
        provider.add_format("big", Format::new(500, 300));
        assert!(matches!(
            provider.generate_public_url(&Media::new(), "big"),
            Err(ProviderError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_thumbnails_reports_partial_progress() {
        let resizer = StubResizer::failing_on(500, 300);
        let (provider, fs) = provider(resizer.clone(), false);
        provider.add_format("admin", Format::new(100, 70));
        provider.add_format("big", Format::new(500, 300));
        provider.add_format("small", Format::new(200, 140));

        let media = Media::new().with_id(7);
        fs.write("default/0001/01/ref.bin", vec![1, 2, 3], "application/octet-stream")
            .await
            .unwrap();

        let err = provider.generate_thumbnails(&media).await.unwrap_err();
        match &err {
            ProviderError::Thumbnails { completed, format, source } => {
                assert_eq!(completed, &vec!["admin".to_string()]);
                assert_eq!(format, "big");
                assert!(matches!(**source, ProviderError::ResizeFailure(_)));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(fs.exists("default/0001/01/thumb_7_admin.jpg").await.unwrap());
        assert!(!fs.exists("default/0001/01/thumb_7_small.jpg").await.unwrap());
        assert_eq!(resizer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            provider.missing_thumbnails(&media).await.unwrap(),
            vec!["big".to_string(), "small".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_transform_marks_error_and_keeps_content() {
        let (provider, _) = provider(StubResizer::ok(), true);
        let mut media = Media::new().with_binary_content(BinaryContent::reference("x"));

        assert!(provider.pre_persist(&mut media).await.is_err());
        assert_eq!(media.provider_status, ProviderStatus::Error);
        assert!(media.binary_content.is_some());

        // Sticky: derivation is skipped
        provider.post_persist(&mut media).await.unwrap();
    }

    #[tokio::test]
    async fn test_pre_persist_without_content_is_noop() {
        let (provider, _) = provider(StubResizer::ok(), false);
        let mut media = Media::new();
        media.provider_status = ProviderStatus::Custom("fake".into());

        provider.pre_persist(&mut media).await.unwrap();
        assert_eq!(media.provider_status, ProviderStatus::Custom("fake".into()));
        assert!(media.provider_reference.is_none());
    }

    #[tokio::test]
    async fn test_pre_update_normalization() {
        let (provider, _) = provider(StubResizer::ok(), false);

        let mut media = Media::new().with_id(1);
        provider.pre_update(&mut media).await.unwrap();
        assert_eq!(media.provider_status, ProviderStatus::Ok);

        media.provider_status = ProviderStatus::Custom("fake".into());
        provider.pre_update(&mut media).await.unwrap();
        provider.pre_update(&mut media).await.unwrap();
        assert_eq!(media.provider_status, ProviderStatus::Custom("fake".into()));

        // New content re-processes even a sticky media
        media.binary_content = Some(BinaryContent::reference("x"));
        provider.pre_update(&mut media).await.unwrap();
        assert_eq!(media.provider_status, ProviderStatus::Ok);
        assert!(media.binary_content.is_none());
    }

    #[tokio::test]
    async fn test_sticky_status_skips_derivation() {
        let resizer = StubResizer::ok();
        let (provider, fs) = provider(resizer.clone(), false);
        provider.add_format("big", Format::new(500, 300));

        let mut media = Media::new().with_id(7);
        fs.write("default/0001/01/ref.bin", vec![1], "application/octet-stream")
            .await
            .unwrap();

        for status in [ProviderStatus::Custom("fake".into()), ProviderStatus::Error] {
            media.provider_status = status.clone();
            provider.post_update(&mut media).await.unwrap();
            provider.post_persist(&mut media).await.unwrap();
            assert_eq!(media.provider_status, status);
        }
        assert_eq!(resizer.calls.load(Ordering::SeqCst), 0);
        assert!(!fs.exists("default/0001/01/thumb_7_big.jpg").await.unwrap());

        media.provider_status = ProviderStatus::Ok;
        provider.post_update(&mut media).await.unwrap();
        assert_eq!(resizer.calls.load(Ordering::SeqCst), 1);
        assert!(fs.exists("default/0001/01/thumb_7_big.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_post_remove_deletes_files() {
        let (provider, fs) = provider(StubResizer::ok(), false);
        provider.add_format("big", Format::new(500, 300));

        let mut media = Media::new().with_id(7);
        fs.write("default/0001/01/ref.bin", vec![1], "application/octet-stream")
            .await
            .unwrap();
        provider.generate_thumbnails(&media).await.unwrap();
        assert_eq!(fs.len().await, 2);

        provider.post_remove(&mut media).await.unwrap();
        assert!(fs.is_empty().await);
        assert!(media.cdn_flush_at.is_some());
    }

    #[test]
    fn test_box_properties() {
        let (provider, _) = provider(StubResizer::ok(), false);
        provider.add_format("admin", Format::with_width(100));

        let mut media = Media::new().with_id(10);
        let props = provider
            .get_helper_properties(&media, "admin", &HelperProperties::new())
            .unwrap();
        assert_eq!(props["width"], 100);
        assert!(props["height"].is_null());

        media.width = Some(400);
        media.height = Some(300);
        let props = provider
            .get_helper_properties(&media, "admin", &HelperProperties::new())
            .unwrap();
        assert_eq!(props["width"], 100);
        assert_eq!(props["height"], 75);
    }
}
