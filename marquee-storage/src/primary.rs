//! Primary store gateway: the durable source of truth.

use ::async_trait::async_trait;
use marquee_core::{
    Content, ContentId, ContentListQuery, ContentPage, ContentPatch, ContentProjection,
    MarqueeResult, Media, MediaPatch,
};

/// Durable CRUD over Content aggregates and their Media.
///
/// Every write is a local transaction scoped to this store and bumps the
/// aggregate's `version`. Writes return the aggregate as committed so callers
/// never need a second read.
#[async_trait]
pub trait PrimaryStore: Send + Sync {
    // ========================================================================
    // CONTENT OPERATIONS
    // ========================================================================

    /// Insert a new content item. Fails with Conflict if the identifier was
    /// ever used, including by a deleted item.
    async fn content_insert(&self, content: &Content) -> MarqueeResult<ContentProjection>;

    /// Apply a patch to an existing content item.
    async fn content_update(
        &self,
        id: ContentId,
        patch: &ContentPatch,
    ) -> MarqueeResult<ContentProjection>;

    /// Delete a content item and, by cascade, its media.
    async fn content_delete(&self, id: ContentId) -> MarqueeResult<()>;

    /// Read the full aggregate (content plus media) in one operation.
    async fn content_get(&self, id: ContentId) -> MarqueeResult<Option<ContentProjection>>;

    /// Filtered, paginated listing of every lifecycle state. Ordered by
    /// publication date, newest first with undated items last, then by
    /// creation time, newest first.
    async fn content_list(&self, query: &ContentListQuery) -> MarqueeResult<ContentPage>;

    // ========================================================================
    // MEDIA OPERATIONS
    // ========================================================================

    /// Attach media to its content. Fails with Conflict if media already exists.
    async fn media_insert(&self, media: &Media) -> MarqueeResult<ContentProjection>;

    /// Patch the media of a content item. The patch is validated against the
    /// current record inside the transaction.
    async fn media_update(
        &self,
        content_id: ContentId,
        patch: &MediaPatch,
    ) -> MarqueeResult<ContentProjection>;

    /// Detach and delete the media of a content item.
    async fn media_delete(&self, content_id: ContentId) -> MarqueeResult<ContentProjection>;

    async fn media_get(&self, content_id: ContentId) -> MarqueeResult<Option<Media>>;
}
