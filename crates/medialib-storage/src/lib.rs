//! Binary storage backends for media files.
//!
//! This crate provides:
//! - The [`Filesystem`] trait providers write reference and derived files through
//! - In-memory storage for tests and tooling
//! - Local directory storage
//! - Cloudflare R2 storage (S3 API)

pub mod error;
pub mod filesystem;
pub mod local;
pub mod memory;
pub mod r2;

pub use error::{StorageError, StorageResult};
pub use filesystem::{content_type_for, Filesystem};
pub use local::LocalFilesystem;
pub use memory::MemoryFilesystem;
pub use r2::{R2Config, R2Filesystem};
