//! In-memory primary store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use marquee_core::{
    Content, ContentId, ContentListQuery, ContentPage, ContentPatch, ContentProjection,
    EntityIdType, EntityType, MarqueeError, MarqueeResult, Media, MediaPatch, StoreError,
};

#[derive(Debug, Default)]
struct StoreState {
    contents: HashMap<ContentId, Content>,
    /// Media keyed by owning content.
    media: HashMap<ContentId, Media>,
    /// Identifiers of deleted content. Never reusable.
    retired: HashSet<ContentId>,
}

impl StoreState {
    fn projection(&self, id: ContentId) -> Option<ContentProjection> {
        self.contents
            .get(&id)
            .map(|c| ContentProjection::new(c.clone(), self.media.get(&id).cloned()))
    }

    fn content_mut(&mut self, id: ContentId) -> MarqueeResult<&mut Content> {
        self.contents
            .get_mut(&id)
            .ok_or_else(|| MarqueeError::not_found(EntityType::Content, id.as_uuid()))
    }

    /// Bump the aggregate version after a write and return the committed state.
    fn commit(&mut self, id: ContentId) -> MarqueeResult<ContentProjection> {
        let content = self.content_mut(id)?;
        content.version += 1;
        content.updated_at = Utc::now();
        self.projection(id)
            .ok_or_else(|| MarqueeError::not_found(EntityType::Content, id.as_uuid()))
    }
}

/// Primary store held in process memory.
///
/// One lock guards the whole aggregate set, so every operation is a
/// serializable transaction.
#[derive(Debug, Default)]
pub struct InMemoryPrimaryStore {
    state: RwLock<StoreState>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryPrimaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `content_get`/`content_list`/`media_get` calls served.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of committed writes.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn content_count(&self) -> usize {
        self.state.read().map(|s| s.contents.len()).unwrap_or(0)
    }

    pub fn media_count(&self) -> usize {
        self.state.read().map(|s| s.media.len()).unwrap_or(0)
    }

    fn read(&self) -> MarqueeResult<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| MarqueeError::Storage(StoreError::LockPoisoned))
    }

    fn write(&self) -> MarqueeResult<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| MarqueeError::Storage(StoreError::LockPoisoned))
    }

    fn committed<T>(&self, result: MarqueeResult<T>) -> MarqueeResult<T> {
        if result.is_ok() {
            self.writes.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}

fn conflict(entity_type: EntityType, reason: impl Into<String>) -> MarqueeError {
    MarqueeError::Storage(StoreError::Conflict {
        entity_type,
        reason: reason.into(),
    })
}

#[async_trait]
impl crate::PrimaryStore for InMemoryPrimaryStore {
    async fn content_insert(&self, content: &Content) -> MarqueeResult<ContentProjection> {
        let mut state = self.write()?;
        let id = content.content_id;
        if state.contents.contains_key(&id) {
            return Err(conflict(EntityType::Content, "already exists"));
        }
        if state.retired.contains(&id) {
            return Err(conflict(EntityType::Content, "identifier was deleted"));
        }
        let mut stored = content.clone();
        stored.version = 1;
        state.contents.insert(id, stored);
        self.committed(state
            .projection(id)
            .ok_or_else(|| MarqueeError::not_found(EntityType::Content, id.as_uuid())))
    }

    async fn content_update(
        &self,
        id: ContentId,
        patch: &ContentPatch,
    ) -> MarqueeResult<ContentProjection> {
        let mut state = self.write()?;
        patch.apply(state.content_mut(id)?, Utc::now());
        self.committed(state.commit(id))
    }

    async fn content_delete(&self, id: ContentId) -> MarqueeResult<()> {
        let mut state = self.write()?;
        if state.contents.remove(&id).is_none() {
            return Err(MarqueeError::not_found(EntityType::Content, id.as_uuid()));
        }
        state.media.remove(&id);
        state.retired.insert(id);
        self.committed(Ok(()))
    }

    async fn content_get(&self, id: ContentId) -> MarqueeResult<Option<ContentProjection>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.read()?.projection(id))
    }

    async fn content_list(&self, query: &ContentListQuery) -> MarqueeResult<ContentPage> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let state = self.read()?;
        let mut matching: Vec<ContentProjection> = state
            .contents
            .keys()
            .filter_map(|id| state.projection(*id))
            .filter(|p| query.matches(p))
            .collect();
        matching.sort_by(|a, b| {
            let (a, b) = (&a.content, &b.content);
            // None sorts below Some, so the reversed comparison puts undated last.
            b.publication_date
                .cmp(&a.publication_date)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.content_id.cmp(&a.content_id))
        });

        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(query.page.offset)
            .take(query.page.limit)
            .collect();
        Ok(ContentPage { total, items })
    }

    async fn media_insert(&self, media: &Media) -> MarqueeResult<ContentProjection> {
        let mut state = self.write()?;
        let id = media.content_id;
        if !state.contents.contains_key(&id) {
            return Err(MarqueeError::not_found(EntityType::Content, id.as_uuid()));
        }
        if state.media.contains_key(&id) {
            return Err(conflict(EntityType::Media, "content already has media"));
        }
        state.media.insert(id, media.clone());
        self.committed(state.commit(id))
    }

    async fn media_update(
        &self,
        content_id: ContentId,
        patch: &MediaPatch,
    ) -> MarqueeResult<ContentProjection> {
        let mut state = self.write()?;
        let media = state
            .media
            .get_mut(&content_id)
            .ok_or_else(|| MarqueeError::not_found(EntityType::Media, content_id.as_uuid()))?;
        patch.validate_against(media)?;
        patch.apply(media, Utc::now());
        self.committed(state.commit(content_id))
    }

    async fn media_delete(&self, content_id: ContentId) -> MarqueeResult<ContentProjection> {
        let mut state = self.write()?;
        if state.media.remove(&content_id).is_none() {
            return Err(MarqueeError::not_found(EntityType::Media, content_id.as_uuid()));
        }
        self.committed(state.commit(content_id))
    }

    async fn media_get(&self, content_id: ContentId) -> MarqueeResult<Option<Media>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.read()?.media.get(&content_id).cloned())
    }
}
