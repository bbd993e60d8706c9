//! Search index gateway.

use ::async_trait::async_trait;
use marquee_core::{ContentId, IndexDocument, MarqueeResult, Pagination, SearchFilters, SearchHits};

/// Document index queried by discovery and mutated only by the reindex worker.
///
/// Implementations must:
/// - ignore an upsert whose `version` is lower than the stored document's
/// - treat deleting a missing document as success
/// - never return non-published documents from `query`
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn upsert(&self, document: &IndexDocument) -> MarqueeResult<()>;

    async fn delete(&self, id: ContentId) -> MarqueeResult<()>;

    /// Ranked identifiers for one page of matches, plus the total hit count.
    async fn query(
        &self,
        filters: &SearchFilters,
        pagination: Pagination,
    ) -> MarqueeResult<SearchHits>;
}
