//! Write coordinator.
//!
//! Every mutation runs three strictly sequential steps:
//!
//! 1. Validate, then commit to the primary store. Failure aborts the mutation.
//! 2. Refresh the affected cache keys at the committed version, tombstone
//!    deleted entities, and retire every cached listing. Failures are logged
//!    and counted, never returned.
//! 3. Enqueue a reindex job with bounded retry. Exhausting the retries raises
//!    the degraded-mode signal but the mutation still succeeds.
//!
//! Steps 2 and 3 never roll back step 1.

use std::sync::Arc;

use chrono::Utc;
use marquee_core::{
    ContentDraft, ContentId, ContentPatch, ContentProjection, EntityIdType, EntityType,
    MarqueeError, MarqueeResult, Media, MediaDraft, MediaId, MediaPatch, ReindexJob, SyncConfig,
};
use marquee_storage::{
    CacheGateway, CacheKey, PrimaryStore, TaskQueue, CONTENT_LIST_PREFIX, FINAL_VERSION,
    TOMBSTONE,
};

use crate::codec;
use crate::hydrator::ListGeneration;
use crate::metrics::SyncMetrics;
use crate::retry::retry_transient;

/// Orchestrates mutations across the primary store, cache and task queue.
pub struct WriteCoordinator {
    store: Arc<dyn PrimaryStore>,
    cache: Arc<dyn CacheGateway>,
    queue: Arc<dyn TaskQueue>,
    config: SyncConfig,
    lists: Arc<ListGeneration>,
    metrics: Arc<SyncMetrics>,
}

impl WriteCoordinator {
    pub fn new(
        store: Arc<dyn PrimaryStore>,
        cache: Arc<dyn CacheGateway>,
        queue: Arc<dyn TaskQueue>,
        config: SyncConfig,
        lists: Arc<ListGeneration>,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            store,
            cache,
            queue,
            config,
            lists,
            metrics,
        }
    }

    // ========================================================================
    // CONTENT
    // ========================================================================

    /// Create a content item and schedule its indexing.
    pub async fn create_content(&self, draft: ContentDraft) -> MarqueeResult<ContentProjection> {
        draft.validate()?;
        let content = draft.into_content(ContentId::now_v7(), Utc::now());
        let projection = self.store.content_insert(&content).await?;

        tracing::debug!(content_id = %content.content_id, "Content created");
        self.refresh_cache(&projection).await;
        self.retire_lists().await;
        self.enqueue(ReindexJob::upsert(projection.content_id())).await;
        Ok(projection)
    }

    pub async fn update_content(
        &self,
        id: ContentId,
        patch: ContentPatch,
    ) -> MarqueeResult<ContentProjection> {
        patch.validate()?;
        let projection = self.store.content_update(id, &patch).await?;

        tracing::debug!(content_id = %id, version = projection.content.version, "Content updated");
        self.refresh_cache(&projection).await;
        self.retire_lists().await;
        self.enqueue(ReindexJob::upsert(id)).await;
        Ok(projection)
    }

    /// Delete a content item and its media.
    ///
    /// Reads fail with NotFound as soon as this returns, even while the index
    /// still holds the document. Both keys are tombstoned, so a read that
    /// started before the delete cannot put the content back in the cache.
    pub async fn delete_content(&self, id: ContentId) -> MarqueeResult<()> {
        self.store.content_delete(id).await?;

        tracing::debug!(content_id = %id, "Content deleted");
        self.tombstone(&CacheKey::content(id)).await;
        self.tombstone(&CacheKey::media(id)).await;
        self.retire_lists().await;
        self.enqueue(ReindexJob::delete(id)).await;
        Ok(())
    }

    // ========================================================================
    // MEDIA
    // ========================================================================

    /// Attach media to a content item. The content document is re-upserted
    /// so its media type facet follows.
    pub async fn create_media(&self, content_id: ContentId, draft: MediaDraft) -> MarqueeResult<Media> {
        draft.validate()?;
        let media = draft.into_media(MediaId::now_v7(), content_id, Utc::now());
        let projection = self.store.media_insert(&media).await?;

        tracing::debug!(content_id = %content_id, media_id = %media.media_id, "Media created");
        self.refresh_cache(&projection).await;
        self.retire_lists().await;
        self.enqueue(ReindexJob::upsert(content_id)).await;
        attached_media(projection)
    }

    pub async fn update_media(&self, content_id: ContentId, patch: MediaPatch) -> MarqueeResult<Media> {
        if patch.is_empty() {
            return Err(MarqueeError::invalid("patch", "contains no changes"));
        }
        let projection = self.store.media_update(content_id, &patch).await?;

        tracing::debug!(content_id = %content_id, "Media updated");
        self.refresh_cache(&projection).await;
        self.retire_lists().await;
        self.enqueue(ReindexJob::upsert(content_id)).await;
        attached_media(projection)
    }

    /// Detach media. Never removes the content document from the index.
    pub async fn delete_media(&self, content_id: ContentId) -> MarqueeResult<()> {
        let projection = self.store.media_delete(content_id).await?;

        tracing::debug!(content_id = %content_id, "Media deleted");
        self.refresh_cache(&projection).await;
        self.retire_lists().await;
        self.enqueue(ReindexJob::upsert(content_id)).await;
        Ok(())
    }

    // ========================================================================
    // DOWNSTREAM STEPS
    // ========================================================================

    /// Write the committed projection to `content:{id}` and mirror its media
    /// to `media:{id}`, both stamped with the committed version. A projection
    /// without media leaves a tombstone under `media:{id}`.
    async fn refresh_cache(&self, projection: &ContentProjection) {
        let id = projection.content_id();
        let version = projection.content.version;
        self.store_entry(&CacheKey::content(id), projection, version)
            .await;
        // `None` encodes as the tombstone.
        self.store_entry(&CacheKey::media(id), &projection.media, version)
            .await;
    }

    async fn store_entry<T: serde::Serialize + Sync>(&self, key: &CacheKey, value: &T, version: u64) {
        let result = match codec::encode(key, value) {
            Ok(bytes) => {
                self.cache
                    .set_versioned(key, &bytes, version, self.config.cache_ttl)
                    .await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(key = %key, version, "A newer version is already cached");
            }
            Err(e) => {
                SyncMetrics::incr(&self.metrics.cache_failures);
                tracing::warn!(key = %key, error = %e, "Cache refresh failed, invalidating");
                // A stale entry must not outlive a failed refresh.
                self.invalidate(key).await;
            }
        }
    }

    async fn tombstone(&self, key: &CacheKey) {
        let result = self
            .cache
            .set_versioned(key, TOMBSTONE, FINAL_VERSION, self.config.cache_ttl)
            .await;
        if let Err(e) = result {
            SyncMetrics::incr(&self.metrics.cache_failures);
            tracing::warn!(key = %key, error = %e, "Cache tombstone failed, invalidating");
            self.invalidate(key).await;
        }
    }

    async fn invalidate(&self, key: &CacheKey) {
        if let Err(e) = self.cache.invalidate(key).await {
            SyncMetrics::incr(&self.metrics.cache_failures);
            tracing::warn!(key = %key, error = %e, "Cache invalidation failed");
        }
    }

    /// Advance the list generation, then drop the listings it orphaned.
    async fn retire_lists(&self) {
        let generation = self.lists.advance();
        match self.cache.invalidate_prefix(CONTENT_LIST_PREFIX).await {
            Ok(removed) => {
                tracing::trace!(generation, removed, "Cached listings retired");
            }
            Err(e) => {
                SyncMetrics::incr(&self.metrics.cache_failures);
                tracing::warn!(generation, error = %e, "Listing invalidation failed");
            }
        }
    }

    async fn enqueue(&self, job: ReindexJob) {
        let content_id = job.content_id;
        let operation = job.operation;
        let result = retry_transient(
            &self.config.enqueue_retry,
            "enqueue_reindex",
            || SyncMetrics::incr(&self.metrics.enqueue_retries),
            || self.queue.enqueue(job.clone()),
        )
        .await;

        match result {
            Ok(()) => self.metrics.set_queue_degraded(false),
            Err(exhausted) => {
                SyncMetrics::incr(&self.metrics.enqueue_failures);
                self.metrics.set_queue_degraded(true);
                tracing::error!(
                    content_id = %content_id,
                    operation = %operation,
                    attempts = exhausted.attempts,
                    error = %exhausted.error,
                    "Reindex job could not be enqueued; search index will lag until the next write"
                );
            }
        }
    }
}

fn attached_media(projection: ContentProjection) -> MarqueeResult<Media> {
    let id = projection.content_id();
    projection
        .media
        .ok_or_else(|| MarqueeError::not_found(EntityType::Media, id.as_uuid()))
}
