//! Sharded storage paths.
//!
//! Files are addressed by `{context}/{first:04}/{second:02}` so that no
//! directory holds more than `second_level` media. Existing files are
//! located by this path: the levels must never change for a running
//! installation.

use medialib_models::Media;

use crate::error::{ProviderError, ProviderResult};

/// Strategy mapping a persisted media to its storage directory.
pub trait PathGenerator: Send + Sync {
    fn generate_path(&self, media: &Media) -> ProviderResult<String>;
}

/// Two-level shard derived from the numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultGenerator {
    first_level: u64,
    second_level: u64,
}

impl Default for DefaultGenerator {
    fn default() -> Self {
        Self {
            first_level: 100_000,
            second_level: 1_000,
        }
    }
}

impl DefaultGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom shard sizes; `second_level` may not exceed `first_level`.
    pub fn with_levels(first_level: u64, second_level: u64) -> ProviderResult<Self> {
        if first_level == 0 || second_level == 0 || second_level > first_level {
            return Err(ProviderError::config(format!(
                "invalid shard levels {}/{}",
                first_level, second_level
            )));
        }

        Ok(Self {
            first_level,
            second_level,
        })
    }
}

impl PathGenerator for DefaultGenerator {
    fn generate_path(&self, media: &Media) -> ProviderResult<String> {
        let id = media
            .id
            .ok_or_else(|| ProviderError::invalid_state("cannot generate a path before persist"))?
            .get();

        let first = id / self.first_level;
        let second = (id - first * self.first_level) / self.second_level;

        Ok(format!(
            "{}/{:04}/{:02}",
            media.context_or_default(),
            first + 1,
            second + 1
        ))
    }
}
