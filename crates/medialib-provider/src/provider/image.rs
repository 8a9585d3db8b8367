//! Image provider.

use async_trait::async_trait;
use medialib_models::{BinaryContent, Media};

use super::{apply_overrides, BaseProvider, FileProvider, HelperProperties, MediaProvider};
use crate::error::{ProviderError, ProviderResult};
use crate::resizer::image_dimensions;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Uploaded images with derived thumbnails.
///
/// Storage of the reference file is that of [`FileProvider`]; thumbnails
/// are resized from the stored reference.
pub struct ImageProvider {
    file: FileProvider,
}

impl ImageProvider {
    /// `base` must carry a resizer for thumbnails to be generated.
    pub fn new(base: BaseProvider) -> Self {
        Self {
            file: FileProvider::new(base).with_allowed_extensions(IMAGE_EXTENSIONS),
        }
    }
}

#[async_trait]
impl MediaProvider for ImageProvider {
    fn base(&self) -> &BaseProvider {
        self.file.base()
    }

    fn reference_key(&self, media: &Media) -> ProviderResult<String> {
        self.file.reference_key(media)
    }

    fn require_thumbnails(&self, _media: &Media) -> bool {
        true
    }

    fn get_reference_image(&self, media: &Media) -> ProviderResult<String> {
        self.file.reference_key(media)
    }

    fn get_helper_properties(
        &self,
        media: &Media,
        format_name: &str,
        overrides: &HelperProperties,
    ) -> ProviderResult<HelperProperties> {
        let (width, height) = self.base().box_for(media, format_name)?;

        let mut properties = HelperProperties::new();
        properties.insert("alt".into(), media.name.clone().into());
        properties.insert("title".into(), media.name.clone().into());
        properties.insert(
            "src".into(),
            self.generate_public_url(media, format_name)?.into(),
        );
        properties.insert("width".into(), width.into());
        properties.insert("height".into(), height.into());
        apply_overrides(&mut properties, overrides);
        Ok(properties)
    }

    async fn transform(&self, media: &mut Media, content: &BinaryContent) -> ProviderResult<()> {
        let (_, bytes) = FileProvider::upload(content)?;
        let (width, height) = image_dimensions(bytes)
            .map_err(|e| ProviderError::invalid_reference(format!("unreadable image: {}", e)))?;

        self.file.transform(media, content).await?;
        media.width = Some(width);
        media.height = Some(height);
        Ok(())
    }

    fn stores_upload(&self) -> bool {
        true
    }

    async fn store_upload(&self, media: &mut Media) -> ProviderResult<()> {
        self.file.store_upload(media).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::DefaultGenerator;
    use crate::resizer::tests::png;
    use crate::resizer::SimpleResizer;
    use medialib_cdn::Server;
    use medialib_models::{Format, ProviderStatus, REFERENCE_FORMAT};
    use medialib_storage::{Filesystem, MemoryFilesystem};
    use std::sync::Arc;

    fn provider() -> (ImageProvider, Arc<MemoryFilesystem>) {
        let fs = Arc::new(MemoryFilesystem::new());
        let base = BaseProvider::new(
            "image",
            fs.clone(),
            Arc::new(Server::new("/uploads/media")),
            Arc::new(DefaultGenerator::new()),
        )
        .with_resizer(Arc::new(SimpleResizer::new()));
        (ImageProvider::new(base), fs)
    }

    #[tokio::test]
    async fn test_upload_generates_thumbnails() {
        let (provider, fs) = provider();
        provider.add_format("small", Format::with_width(100));
        provider.add_format("preview", Format::new(50, 50).with_extension("png"));

        let mut media = Media::for_provider("image")
            .with_binary_content(BinaryContent::file("logo.png", png(400, 200)));

        provider.pre_persist(&mut media).await.unwrap();
        assert_eq!((media.width, media.height), (Some(400), Some(200)));
        assert_eq!(media.content_type.as_deref(), Some("image/png"));

        media.id = Some(medialib_models::MediaId(3));
        provider.post_persist(&mut media).await.unwrap();
        assert_eq!(media.provider_status, ProviderStatus::Ok);

        let reference = provider.generate_private_url(&media, REFERENCE_FORMAT).unwrap();
        assert!(fs.exists(&reference).await.unwrap());
        assert!(fs.exists("default/0001/01/thumb_3_small.jpg").await.unwrap());
        assert!(fs.exists("default/0001/01/thumb_3_preview.png").await.unwrap());
        assert!(provider.missing_thumbnails(&media).await.unwrap().is_empty());

        let thumb = fs.read("default/0001/01/thumb_3_small.jpg").await.unwrap();
        assert_eq!(image_dimensions(&thumb).unwrap(), (100, 50));
    }

    #[tokio::test]
    async fn test_rejects_non_image() {
        let (provider, _) = provider();
        let mut media = Media::for_provider("image")
            .with_binary_content(BinaryContent::file("logo.png", b"not a png".to_vec()));

        let err = provider.pre_persist(&mut media).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidReference(_)));
        assert_eq!(media.provider_status, ProviderStatus::Error);
    }

    #[test]
    fn test_helper_properties() {
        let (provider, _) = provider();
        provider.add_format("admin", Format::with_width(100));

        let mut media = Media::for_provider("image").with_id(10).with_reference("a.png");
        media.name = Some("Les tests".into());
        media.width = Some(100);
        media.height = Some(100);

        let props = provider
            .get_helper_properties(&media, "admin", &HelperProperties::new())
            .unwrap();
        assert_eq!(props["src"], "/uploads/media/default/0001/01/thumb_10_admin.jpg");
        assert_eq!(props["width"], 100);
        assert_eq!(props["height"], 100);
        assert_eq!(props["alt"], "Les tests");
    }
}
