//! Shared data models for the media library.
//!
//! This crate provides Serde-serializable types for:
//! - Media entities and their transient upload content
//! - Provider status values and their lifecycle semantics
//! - Format definitions for derived renditions
//! - Remote reference extraction (YouTube, Vimeo, Dailymotion)

pub mod format;
pub mod media;
pub mod metadata;
pub mod reference;
pub mod status;

// Re-export common types
pub use format::{Format, REFERENCE_FORMAT};
pub use media::{BinaryContent, Media, MediaId, DEFAULT_CONTEXT};
pub use metadata::ProviderMetadata;
pub use reference::{
    extract_dailymotion_id, extract_vimeo_id, extract_youtube_id, ReferenceError, ReferenceResult,
};
pub use status::ProviderStatus;
