//! Generic file provider.

use async_trait::async_trait;
use medialib_models::{BinaryContent, Media, REFERENCE_FORMAT};
use medialib_storage::content_type_for;
use tracing::{debug, info};
use uuid::Uuid;

use super::{apply_overrides, BaseProvider, HelperProperties, MediaProvider};
use crate::error::{ProviderError, ProviderResult};

/// Stores uploads verbatim under `{path}/{uuid}.{ext}`.
pub struct FileProvider {
    base: BaseProvider,
    allowed_extensions: Vec<String>,
}

impl FileProvider {
    pub fn new(base: BaseProvider) -> Self {
        Self {
            base,
            allowed_extensions: Vec::new(),
        }
    }

    /// Restrict uploads to these extensions (case-insensitive). Empty allows all.
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub(crate) fn upload<'a>(content: &'a BinaryContent) -> ProviderResult<(&'a str, &'a [u8])> {
        match content {
            BinaryContent::File { filename, bytes } => Ok((filename.as_str(), bytes.as_slice())),
            BinaryContent::Reference(_) => Err(ProviderError::invalid_reference(
                "expected an uploaded file",
            )),
        }
    }
}

fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
}

#[async_trait]
impl MediaProvider for FileProvider {
    fn base(&self) -> &BaseProvider {
        &self.base
    }

    fn reference_key(&self, media: &Media) -> ProviderResult<String> {
        let reference = media
            .provider_reference
            .as_deref()
            .ok_or_else(|| ProviderError::missing_metadata("provider_reference"))?;
        Ok(format!("{}/{}", self.generate_path(media)?, reference))
    }

    fn require_thumbnails(&self, _media: &Media) -> bool {
        false
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
        if !self.base.formats().is_addressable(media, format_name) {
            return Err(ProviderError::UnknownFormat(format_name.to_string()));
        }

        let mut properties = HelperProperties::new();
        properties.insert(
            "title".into(),
            media
                .name
                .clone()
                .or_else(|| media.provider_reference.clone())
                .into(),
        );
        properties.insert(
            "file".into(),
            self.generate_public_url(media, REFERENCE_FORMAT)?.into(),
        );
        apply_overrides(&mut properties, overrides);
        Ok(properties)
    }

    async fn transform(&self, media: &mut Media, content: &BinaryContent) -> ProviderResult<()> {
        let (filename, bytes) = Self::upload(content)?;
        if bytes.is_empty() {
            return Err(ProviderError::invalid_reference("empty upload"));
        }

        let ext = extension(filename);
        if !self.allowed_extensions.is_empty() {
            let allowed = ext
                .as_ref()
                .map(|e| self.allowed_extensions.contains(e))
                .unwrap_or(false);
            if !allowed {
                return Err(ProviderError::invalid_reference(format!(
                    "extension of {} is not allowed",
                    filename
                )));
            }
        }

        if media.is_persisted() {
            if let Ok(previous) = self.reference_key(media) {
                media.replaced_reference = Some(previous);
            }
        }

        let id = Uuid::new_v4().simple().to_string();
        media.provider_reference = Some(match ext {
            Some(ext) => format!("{}.{}", id, ext),
            None => id,
        });
        if media.name.is_none() {
            media.name = Some(filename.to_string());
        }
        media.content_type = Some(content_type_for(filename).to_string());
        media.size = Some(bytes.len() as u64);
        Ok(())
    }

    fn stores_upload(&self) -> bool {
        true
    }

    async fn store_upload(&self, media: &mut Media) -> ProviderResult<()> {
        let Some(BinaryContent::File { bytes, .. }) = &media.binary_content else {
            return Ok(());
        };

        let key = self.reference_key(media)?;
        let len = bytes.len();
        self.base
            .filesystem()
            .write(&key, bytes.clone(), content_type_for(&key))
            .await?;
        media.binary_content = None;

        if let Some(previous) = media.replaced_reference.take() {
            if previous != key {
                self.base.filesystem().delete(&previous).await?;
                debug!(provider = self.name(), "Deleted replaced reference {}", previous);
            }
        }

        info!(
            media_id = media.id.map(|id| id.get()),
            provider = self.name(),
            bytes = len,
            "Stored {}",
            key
        );
        Ok(())
    }
}
