//! Read hydrator: cache-aside resolution of content projections.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use marquee_core::{
    ContentId, ContentListQuery, ContentPage, ContentProjection, EntityIdType, EntityType,
    MarqueeError, MarqueeResult, Media,
};
use marquee_storage::{CacheGateway, CacheKey, PrimaryStore};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec;
use crate::metrics::SyncMetrics;

/// Narrow read port for consumers outside the write path.
///
/// Discovery hydrates through this port instead of reaching into storage.
#[async_trait]
pub trait ContentCatalog: Send + Sync {
    async fn get_by_id(&self, id: ContentId) -> MarqueeResult<ContentProjection>;

    /// Projections in input order. Identifiers that fail to hydrate are omitted.
    async fn get_many(&self, ids: &[ContentId]) -> Vec<ContentProjection>;
}

/// Generation counter embedded in content-list cache keys.
///
/// The write path advances it after every commit, so a listing cached from
/// an earlier generation is never read again, even if a slow reader stores
/// it after the mutation.
#[derive(Debug, Default)]
pub struct ListGeneration(AtomicU64);

impl ListGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Retire every listing cached so far. Returns the new generation.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Outcome of a cache lookup.
enum Cached<T> {
    Hit(T),
    /// A tombstone: the entity was deleted.
    Gone,
    Miss,
}

/// Resolves identifiers to projections, preferring the cache.
///
/// A hit never touches the primary store. A miss costs exactly one
/// primary-store read and one versioned cache population, which is refused
/// when the write path has meanwhile cached a newer version or a tombstone.
/// Absence found in the primary store is not cached.
pub struct ReadHydrator {
    store: Arc<dyn PrimaryStore>,
    cache: Arc<dyn CacheGateway>,
    cache_ttl: Duration,
    lists: Arc<ListGeneration>,
    metrics: Arc<SyncMetrics>,
}

impl ReadHydrator {
    pub fn new(
        store: Arc<dyn PrimaryStore>,
        cache: Arc<dyn CacheGateway>,
        cache_ttl: Duration,
        lists: Arc<ListGeneration>,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            store,
            cache,
            cache_ttl,
            lists,
            metrics,
        }
    }

    /// Resolve a content projection.
    pub async fn get(&self, id: ContentId) -> MarqueeResult<ContentProjection> {
        let key = CacheKey::content(id);
        let not_found = || MarqueeError::not_found(EntityType::Content, id.as_uuid());
        match self.lookup::<ContentProjection>(&key).await {
            Cached::Hit(projection) => return Ok(projection),
            Cached::Gone => return Err(not_found()),
            Cached::Miss => {}
        }

        let projection = self.store.content_get(id).await?.ok_or_else(not_found)?;
        self.populate(&key, &projection, projection.content.version).await;
        Ok(projection)
    }

    /// Resolve the media attached to a content item.
    pub async fn get_media(&self, content_id: ContentId) -> MarqueeResult<Media> {
        let key = CacheKey::media(content_id);
        let not_found = || MarqueeError::not_found(EntityType::Media, content_id.as_uuid());
        match self.lookup::<Media>(&key).await {
            Cached::Hit(media) => return Ok(media),
            Cached::Gone => return Err(not_found()),
            Cached::Miss => {}
        }

        // Read the aggregate so the entry is stamped with the version it came from.
        let projection = self.store.content_get(content_id).await?.ok_or_else(not_found)?;
        let version = projection.content.version;
        let media = projection.media.ok_or_else(not_found)?;
        self.populate(&key, &media, version).await;
        Ok(media)
    }

    /// Editorial listing, cached per query until the next mutation.
    pub async fn list(&self, query: &ContentListQuery) -> MarqueeResult<ContentPage> {
        if query.page.limit == 0 {
            return Err(MarqueeError::invalid("limit", "must be greater than 0"));
        }
        // Taken before the store read: a mutation committed after this point
        // advances the generation and orphans whatever this call caches.
        let generation = self.lists.current();
        let key = CacheKey::content_list(generation, query);
        if let Cached::Hit(page) = self.lookup::<ContentPage>(&key).await {
            return Ok(page);
        }

        let page = self.store.content_list(query).await?;
        self.populate(&key, &page, generation).await;
        Ok(page)
    }

    /// Cache lookup. Errors and undecodable entries count as misses.
    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Cached<T> {
        let bytes = match self.cache.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                SyncMetrics::incr(&self.metrics.cache_misses);
                tracing::debug!(key = %key, "Cache miss");
                return Cached::Miss;
            }
            Err(e) => {
                SyncMetrics::incr(&self.metrics.cache_misses);
                tracing::warn!(key = %key, error = %e, "Cache read failed, falling back to primary store");
                return Cached::Miss;
            }
        };

        match codec::decode::<Option<T>>(key, &bytes) {
            Ok(Some(value)) => {
                SyncMetrics::incr(&self.metrics.cache_hits);
                tracing::debug!(key = %key, "Cache hit");
                Cached::Hit(value)
            }
            Ok(None) => {
                SyncMetrics::incr(&self.metrics.cache_hits);
                tracing::debug!(key = %key, "Cache hit on tombstone");
                Cached::Gone
            }
            Err(e) => {
                SyncMetrics::incr(&self.metrics.cache_misses);
                SyncMetrics::incr(&self.metrics.cache_decode_errors);
                tracing::warn!(key = %key, error = %e, "Undecodable cache entry, treating as miss");
                Cached::Miss
            }
        }
    }

    async fn populate<T: Serialize + Sync>(&self, key: &CacheKey, value: &T, version: u64) {
        let result = match codec::encode(key, value) {
            Ok(bytes) => {
                self.cache
                    .set_versioned(key, &bytes, version, self.cache_ttl)
                    .await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(true) => {}
            Ok(false) => {
                SyncMetrics::incr(&self.metrics.stale_populates);
                tracing::debug!(key = %key, version, "Newer entry already cached, dropping stale read");
            }
            Err(e) => tracing::warn!(key = %key, error = %e, "Cache population failed"),
        }
    }
}

#[async_trait]
impl ContentCatalog for ReadHydrator {
    async fn get_by_id(&self, id: ContentId) -> MarqueeResult<ContentProjection> {
        self.get(id).await
    }

    async fn get_many(&self, ids: &[ContentId]) -> Vec<ContentProjection> {
        join_all(ids.iter().map(|id| self.get(*id)))
            .await
            .into_iter()
            .zip(ids)
            .filter_map(|(result, id)| match result {
                Ok(projection) => Some(projection),
                Err(e) => {
                    tracing::debug!(content_id = %id, error = %e, "Skipping unresolvable content");
                    None
                }
            })
            .collect()
    }
}
