//! Media persistence around provider lifecycle hooks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use medialib_models::{Media, MediaId};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::pool::Pool;
use crate::provider::{require_id, MediaProvider};

/// Storage of media documents.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Store a new media and assign its id.
    async fn insert(&self, media: &mut Media) -> ProviderResult<()>;

    /// Replace a stored media.
    async fn update(&self, media: &Media) -> ProviderResult<()>;

    async fn remove(&self, id: MediaId) -> ProviderResult<()>;

    async fn find(&self, id: MediaId) -> ProviderResult<Option<Media>>;
}

/// Repository keeping media in memory, ids assigned sequentially.
pub struct InMemoryRepository {
    next_id: AtomicU64,
    media: RwLock<HashMap<MediaId, Media>>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(first_id: u64) -> Self {
        Self {
            next_id: AtomicU64::new(first_id),
            media: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.media.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.media.read().await.is_empty()
    }
}

#[async_trait]
impl MediaRepository for InMemoryRepository {
    async fn insert(&self, media: &mut Media) -> ProviderResult<()> {
        if media.id.is_some() {
            return Err(ProviderError::repository("media already has an id"));
        }

        let id = MediaId(self.next_id.fetch_add(1, Ordering::SeqCst));
        media.id = Some(id);
        self.media.write().await.insert(id, media.clone());
        Ok(())
    }

    async fn update(&self, media: &Media) -> ProviderResult<()> {
        let id = require_id(media)?;
        let mut stored = self.media.write().await;
        match stored.get_mut(&id) {
            Some(entry) => {
                *entry = media.clone();
                Ok(())
            }
            None => Err(ProviderError::repository(format!("media {} not found", id))),
        }
    }

    async fn remove(&self, id: MediaId) -> ProviderResult<()> {
        self.media.write().await.remove(&id);
        Ok(())
    }

    async fn find(&self, id: MediaId) -> ProviderResult<Option<Media>> {
        Ok(self.media.read().await.get(&id).cloned())
    }
}

/// Saves and deletes media, invoking provider hooks around persistence.
pub struct MediaManager<R: MediaRepository> {
    pool: Arc<Pool>,
    repository: R,
}

impl<R: MediaRepository> MediaManager<R> {
    pub fn new(pool: Arc<Pool>, repository: R) -> Self {
        Self { pool, repository }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Resolve the media's provider and register its context formats.
    fn provider_for(&self, media: &mut Media) -> ProviderResult<Arc<dyn MediaProvider>> {
        if media.context.is_none() {
            media.context = Some(self.pool.default_context().to_string());
        }

        let name = media
            .provider_name
            .as_deref()
            .ok_or_else(|| ProviderError::invalid_state("media has no provider name"))?;
        let provider = self.pool.get_provider(name)?;
        self.pool
            .register_context_formats(provider.as_ref(), media.context_or_default())?;
        Ok(provider)
    }

    /// Create or update a media.
    ///
    /// `context` and `provider_name` override the media's own values.
    /// Derived files are generated after the first write; if that fails the
    /// media stays stored without them (see [`Self::regenerate_missing`]).
    pub async fn save(
        &self,
        media: &mut Media,
        context: Option<&str>,
        provider_name: Option<&str>,
    ) -> ProviderResult<()> {
        if let Some(context) = context {
            media.context = Some(context.to_string());
        }
        if let Some(name) = provider_name {
            media.provider_name = Some(name.to_string());
        }

        let provider = self.provider_for(media)?;
        let is_new = media.id.is_none();

        if is_new {
            provider.pre_persist(media).await?;
            self.repository.insert(media).await?;
            provider.post_persist(media).await?;
        } else {
            provider.pre_update(media).await?;
            self.repository.update(media).await?;
            provider.post_update(media).await?;
        }

        self.repository.update(media).await?;

        info!(
            media_id = media.id.map(|id| id.get()),
            provider = provider.name(),
            context = media.context_or_default(),
            status = %media.provider_status,
            created = is_new,
            "Saved media"
        );
        Ok(())
    }

    /// Delete a media and its files.
    pub async fn delete(&self, media: &mut Media) -> ProviderResult<()> {
        let id = require_id(media)?;
        let provider = self.provider_for(media)?;

        provider.pre_remove(media).await?;
        self.repository.remove(id).await?;
        provider.post_remove(media).await?;

        info!(media_id = id.get(), provider = provider.name(), "Deleted media");
        Ok(())
    }

    /// Regenerate derived files reported missing. Returns the formats written.
    pub async fn regenerate_missing(&self, media: &mut Media) -> ProviderResult<Vec<String>> {
        let provider = self.provider_for(media)?;
        if media.provider_status.is_sticky() {
            debug!(
                media_id = media.id.map(|id| id.get()),
                status = %media.provider_status,
                "Not regenerating sticky media"
            );
            return Ok(Vec::new());
        }

        let missing = provider.missing_thumbnails(media).await?;
        if missing.is_empty() {
            return Ok(missing);
        }

        warn!(
            media_id = media.id.map(|id| id.get()),
            formats = ?missing,
            "Derived files missing, regenerating"
        );
        provider.generate_formats(media, &missing).await
    }
}
