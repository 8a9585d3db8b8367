//! Format definitions for derived renditions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the sentinel format addressing the original (reference) file.
pub const REFERENCE_FORMAT: &str = "reference";

/// Default output extension for derived thumbnails.
pub const DEFAULT_THUMBNAIL_EXTENSION: &str = "jpg";

/// Default JPEG quality for derived thumbnails.
pub const DEFAULT_QUALITY: u8 = 80;

/// Target geometry of a derived rendition.
///
/// Either dimension may be omitted; the missing one is derived from the
/// source aspect ratio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Format {
    /// Target width in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Target height in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Encoder quality (1-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    /// Output extension (jpg, png)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Preserve the aspect ratio by fitting inside the box
    #[serde(default = "default_constraint")]
    pub constraint: bool,
}

fn default_constraint() -> bool {
    true
}

impl Default for Format {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            quality: None,
            format: None,
            constraint: true,
        }
    }
}

impl Format {
    /// Create a format with both dimensions set.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    /// Create a format constrained by width only.
    pub fn with_width(width: u32) -> Self {
        Self {
            width: Some(width),
            ..Self::default()
        }
    }

    /// Set the aspect-ratio constraint.
    pub fn constrained(mut self, constraint: bool) -> Self {
        self.constraint = constraint;
        self
    }

    /// Set the output extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.format = Some(extension.into());
        self
    }

    /// Output extension, falling back to jpg.
    pub fn extension(&self) -> &str {
        self.format.as_deref().unwrap_or(DEFAULT_THUMBNAIL_EXTENSION)
    }

    /// Encoder quality, clamped to 1-100.
    pub fn quality(&self) -> u8 {
        self.quality.unwrap_or(DEFAULT_QUALITY).clamp(1, 100)
    }

    /// Compute the rendered box for a source of the given size.
    ///
    /// With both dimensions and `constraint`, the source is fitted inside the
    /// box. A single dimension is completed from the source aspect ratio.
    /// Without any dimension the source size is returned.
    pub fn box_for(&self, source_width: u32, source_height: u32) -> (u32, u32) {
        let ratio = |num: u32, den: u32, value: u32| -> u32 {
            if den == 0 {
                return value;
            }
            ((value as u64 * num as u64 + den as u64 / 2) / den as u64).max(1) as u32
        };

        match (self.width, self.height) {
            (Some(w), Some(h)) if self.constraint && source_width > 0 && source_height > 0 => {
                let scale_w = w as f64 / source_width as f64;
                let scale_h = h as f64 / source_height as f64;
                let scale = scale_w.min(scale_h);
                (
                    ((source_width as f64 * scale).round() as u32).max(1),
                    ((source_height as f64 * scale).round() as u32).max(1),
                )
            }
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, ratio(source_height, source_width, w)),
            (None, Some(h)) => (ratio(source_width, source_height, h), h),
            (None, None) => (source_width, source_height),
        }
    }
}
