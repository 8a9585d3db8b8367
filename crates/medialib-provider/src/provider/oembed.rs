//! oEmbed video providers (YouTube, Vimeo, Dailymotion).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use medialib_models::{
    extract_dailymotion_id, extract_vimeo_id, extract_youtube_id, BinaryContent, Media,
    ReferenceResult,
};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{require_id, BaseProvider, HelperProperties, MediaProvider};
use crate::error::{ProviderError, ProviderResult};
use crate::fetcher::MetadataFetcher;

/// Content type recorded for embedded videos.
const VIDEO_CONTENT_TYPE: &str = "video/x-flv";

/// Video platform exposing an oEmbed endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPlatform {
    YouTube,
    Vimeo,
    Dailymotion,
}

impl VideoPlatform {
    pub fn name(&self) -> &'static str {
        match self {
            VideoPlatform::YouTube => "youtube",
            VideoPlatform::Vimeo => "vimeo",
            VideoPlatform::Dailymotion => "dailymotion",
        }
    }

    /// Resolve a video id from an id or a page URL.
    pub fn extract_id(&self, input: &str) -> ReferenceResult<String> {
        match self {
            VideoPlatform::YouTube => extract_youtube_id(input),
            VideoPlatform::Vimeo => extract_vimeo_id(input),
            VideoPlatform::Dailymotion => extract_dailymotion_id(input),
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            VideoPlatform::YouTube => "https://www.youtube.com/oembed",
            VideoPlatform::Vimeo => "https://vimeo.com/api/oembed.json",
            VideoPlatform::Dailymotion => "https://www.dailymotion.com/services/oembed",
        }
    }

    pub fn page_url(&self, id: &str) -> String {
        match self {
            VideoPlatform::YouTube => format!("https://www.youtube.com/watch?v={}", id),
            VideoPlatform::Vimeo => format!("https://vimeo.com/{}", id),
            VideoPlatform::Dailymotion => format!("https://www.dailymotion.com/video/{}", id),
        }
    }

    pub fn player_url(&self, id: &str) -> String {
        match self {
            VideoPlatform::YouTube => format!("https://www.youtube.com/embed/{}", id),
            VideoPlatform::Vimeo => format!("https://player.vimeo.com/video/{}", id),
            VideoPlatform::Dailymotion => format!("https://www.dailymotion.com/embed/video/{}", id),
        }
    }

    /// Embed player parameters before overrides.
    pub fn default_player_parameters(&self) -> Map<String, Value> {
        let defaults = match self {
            VideoPlatform::YouTube => json!({
                "autoplay": 0,
                "fs": 1,
                "hd": 1,
                "rel": 0,
            }),
            VideoPlatform::Vimeo => json!({
                "autoplay": 0,
                "byline": 1,
                "portrait": 1,
                "title": 1,
            }),
            VideoPlatform::Dailymotion => json!({
                "autoplay": 0,
                "info": 0,
                "logo": 0,
                "related": 0,
            }),
        };

        match defaults {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl fmt::Display for VideoPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Encode player parameters as a query string; booleans become 1/0.
fn query_string(params: &Map<String, Value>) -> String {
    params
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(&value))
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn is_enabled(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() != Some(0),
        Some(Value::String(s)) => s != "0" && !s.eq_ignore_ascii_case("false"),
        _ => false,
    }
}

/// Remote video referenced by id; metadata comes from the platform's
/// oEmbed endpoint and thumbnails from its poster image.
pub struct OEmbedProvider {
    base: BaseProvider,
    platform: VideoPlatform,
    fetcher: Arc<dyn MetadataFetcher>,
    endpoint: String,
}

impl OEmbedProvider {
    pub fn new(base: BaseProvider, platform: VideoPlatform, fetcher: Arc<dyn MetadataFetcher>) -> Self {
        Self {
            base,
            platform,
            fetcher,
            endpoint: platform.default_endpoint().to_string(),
        }
    }

    /// Use another oEmbed endpoint (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn platform(&self) -> VideoPlatform {
        self.platform
    }

    pub fn oembed_url(&self, id: &str) -> String {
        format!(
            "{}?url={}&format=json",
            self.endpoint,
            urlencoding::encode(&self.platform.page_url(id))
        )
    }
}

#[async_trait]
impl MediaProvider for OEmbedProvider {
    fn base(&self) -> &BaseProvider {
        &self.base
    }

    /// Local copy of the poster image.
    fn reference_key(&self, media: &Media) -> ProviderResult<String> {
        Ok(format!(
            "{}/thumb_{}_reference.jpg",
            self.generate_path(media)?,
            require_id(media)?
        ))
    }

    fn require_thumbnails(&self, _media: &Media) -> bool {
        true
    }

    fn get_reference_image(&self, media: &Media) -> ProviderResult<String> {
        media
            .provider_metadata
            .get_str("thumbnail_url")
            .map(str::to_string)
            .ok_or_else(|| ProviderError::missing_metadata("thumbnail_url"))
    }

    async fn reference_image_bytes(&self, media: &Media) -> ProviderResult<Vec<u8>> {
        let url = self.get_reference_image(media)?;
        let key = self.reference_key(media)?;

        let bytes = self.fetcher.fetch_bytes(&url).await?;
        self.base
            .filesystem()
            .write(&key, bytes.clone(), "image/jpeg")
            .await?;

        debug!(platform = %self.platform, "Stored poster {} as {}", url, key);
        Ok(bytes)
    }

    fn get_helper_properties(
        &self,
        media: &Media,
        format_name: &str,
        overrides: &HelperProperties,
    ) -> ProviderResult<HelperProperties> {
        let (width, height) = self.base.box_for(media, format_name)?;
        let reference = media
            .provider_reference
            .as_deref()
            .ok_or_else(|| ProviderError::missing_metadata("provider_reference"))?;

        let mut parameters = self.platform.default_player_parameters();
        if let Some(Value::Object(extra)) = overrides.get("player_parameters") {
            parameters.extend(extra.clone());
        }

        let allow_full_screen = match self.platform {
            VideoPlatform::YouTube => is_enabled(parameters.get("fs")),
            _ => true,
        };
        let query = query_string(&parameters);

        let mut properties = HelperProperties::new();
        properties.insert(
            "player_url".into(),
            format!("{}?{}", self.platform.player_url(reference), query).into(),
        );
        properties.insert("player_parameters".into(), query.into());
        properties.insert(
            "allow_full_screen".into(),
            if allow_full_screen { "true" } else { "false" }.into(),
        );
        properties.insert("allow_script_access".into(), "always".into());
        properties.insert("width".into(), width.into());
        properties.insert("height".into(), height.into());

        for (key, value) in overrides {
            if key != "player_parameters" {
                properties.insert(key.clone(), value.clone());
            }
        }
        Ok(properties)
    }

    async fn transform(&self, media: &mut Media, content: &BinaryContent) -> ProviderResult<()> {
        let input = match content {
            BinaryContent::Reference(input) => input,
            BinaryContent::File { .. } => {
                return Err(ProviderError::invalid_reference(format!(
                    "{} expects a video id or URL",
                    self.platform
                )))
            }
        };

        let id = self.platform.extract_id(input)?;
        let metadata = self.fetcher.fetch_metadata(&self.oembed_url(&id)).await?;

        if let Some(title) = metadata.get_str("title") {
            media.name = Some(title.to_string());
        }
        if let Some(author) = metadata.get_str("author_name") {
            media.author_name = Some(author.to_string());
        }
        media.width = metadata.get_u32("width");
        media.height = metadata.get_u32("height");
        media.content_type = Some(VIDEO_CONTENT_TYPE.to_string());
        media.provider_reference = Some(id);
        media.provider_metadata = metadata;
        Ok(())
    }
}
