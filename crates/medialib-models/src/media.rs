//! Media entity.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::metadata::ProviderMetadata;
use crate::status::ProviderStatus;

/// Context used when a media does not name one.
pub const DEFAULT_CONTEXT: &str = "default";

/// Numeric media identifier, assigned on first persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct MediaId(pub u64);

impl MediaId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MediaId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Transient upload content, consumed by the provider lifecycle.
#[derive(Clone, PartialEq, Eq)]
pub enum BinaryContent {
    /// Remote reference: a provider id or a URL pointing at it
    Reference(String),
    /// Uploaded file
    File { filename: String, bytes: Vec<u8> },
}

impl BinaryContent {
    pub fn reference(value: impl Into<String>) -> Self {
        Self::Reference(value.into())
    }

    pub fn file(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::File {
            filename: filename.into(),
            bytes,
        }
    }
}

impl fmt::Debug for BinaryContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryContent::Reference(value) => f.debug_tuple("Reference").field(value).finish(),
            BinaryContent::File { filename, bytes } => f
                .debug_struct("File")
                .field("filename", filename)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

/// Media metadata handled by a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Media {
    /// Numeric id (None until first persist)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MediaId>,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Name of the provider handling this media
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,

    /// Provider-specific reference (remote id or stored filename)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_reference: Option<String>,

    #[serde(default)]
    pub provider_metadata: ProviderMetadata,

    #[serde(default)]
    #[schemars(with = "String")]
    pub provider_status: ProviderStatus,

    /// Format-set group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Size of the reference file in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Route public URLs through the flushable CDN
    #[serde(default)]
    pub cdn_is_flushable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdn_flush_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Upload content, never persisted
    #[serde(skip)]
    #[schemars(skip)]
    pub binary_content: Option<BinaryContent>,

    /// Storage key of a reference file superseded by a re-upload, deleted
    /// once the new upload is stored
    #[serde(skip)]
    #[schemars(skip)]
    pub replaced_reference: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Media {
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Create a media for a provider.
    pub fn for_provider(provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: Some(provider_name.into()),
            ..Self::new()
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(MediaId(id));
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.provider_reference = Some(reference.into());
        self
    }

    pub fn with_binary_content(mut self, content: BinaryContent) -> Self {
        self.binary_content = Some(content);
        self
    }

    /// Context name, falling back to [`DEFAULT_CONTEXT`].
    pub fn context_or_default(&self) -> &str {
        self.context.as_deref().unwrap_or(DEFAULT_CONTEXT)
    }

    /// Whether the media has been persisted at least once.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Bump `updated_at` (and `created_at` when unset).
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }
}
