//! Image resizing.

use std::io::Cursor;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat};
use medialib_models::Format;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Renders a source image into a format.
#[async_trait]
pub trait Resizer: Send + Sync {
    /// Resize `source` into `format`'s box and encode it with the format's
    /// extension and quality.
    async fn resize(&self, source: &[u8], format: &Format) -> ProviderResult<Vec<u8>>;
}

/// Read the pixel dimensions of an encoded image.
pub fn image_dimensions(bytes: &[u8]) -> ProviderResult<(u32, u32)> {
    image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ProviderError::resize_failure(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ProviderError::resize_failure(e.to_string()))
}

/// Resizer backed by the `image` crate.
///
/// Constrained formats scale the source into the box keeping its aspect
/// ratio; unconstrained formats with both dimensions crop to fill.
#[derive(Debug, Clone, Copy)]
pub struct SimpleResizer {
    filter: FilterType,
}

impl Default for SimpleResizer {
    fn default() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }
}

impl SimpleResizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn render(source: &[u8], format: &Format, filter: FilterType) -> ProviderResult<Vec<u8>> {
        let image = image::load_from_memory(source)
            .map_err(|e| ProviderError::resize_failure(format!("decode failed: {}", e)))?;

        let (width, height) = format.box_for(image.width(), image.height());
        let resized = match (format.width, format.height) {
            (Some(_), Some(_)) if !format.constraint => image.resize_to_fill(width, height, filter),
            _ => image.resize_exact(width, height, filter),
        };

        let output = match format.extension().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => ImageOutputFormat::Jpeg(format.quality()),
            "png" => ImageOutputFormat::Png,
            other => {
                return Err(ProviderError::resize_failure(format!(
                    "unsupported output format: {}",
                    other
                )))
            }
        };

        // JPEG has no alpha channel
        let resized = match output {
            ImageOutputFormat::Jpeg(_) => DynamicImage::ImageRgb8(resized.to_rgb8()),
            _ => resized,
        };

        let mut buffer = Cursor::new(Vec::new());
        resized
            .write_to(&mut buffer, output)
            .map_err(|e| ProviderError::resize_failure(format!("encode failed: {}", e)))?;

        debug!(width, height, bytes = buffer.get_ref().len(), "Rendered thumbnail");
        Ok(buffer.into_inner())
    }
}

#[async_trait]
impl Resizer for SimpleResizer {
    async fn resize(&self, source: &[u8], format: &Format) -> ProviderResult<Vec<u8>> {
        let source = source.to_vec();
        let format = format.clone();
        let filter = self.filter;

        tokio::task::spawn_blocking(move || Self::render(&source, &format, filter))
            .await
            .map_err(|e| ProviderError::resize_failure(format!("resize task failed: {}", e)))?
    }
}
