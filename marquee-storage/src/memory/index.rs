//! In-memory search index.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use marquee_core::{
    ContentId, IndexDocument, IndexError, MarqueeError, MarqueeResult, Pagination,
    SearchFilters, SearchHits,
};

/// Ranking: publication date desc (undated last), then created_at desc, then id.
fn rank(a: &IndexDocument, b: &IndexDocument) -> CmpOrdering {
    match (a.publication_date, b.publication_date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => CmpOrdering::Less,
        (None, Some(_)) => CmpOrdering::Greater,
        (None, None) => CmpOrdering::Equal,
    }
    .then_with(|| b.created_at.cmp(&a.created_at))
    .then_with(|| a.content_id.cmp(&b.content_id))
}

/// Search index held in process memory.
#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    documents: RwLock<HashMap<ContentId, IndexDocument>>,
    upserts: AtomicU64,
    deletes: AtomicU64,
    /// Upserts ignored because a newer version was already indexed.
    stale_upserts: AtomicU64,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored document, regardless of lifecycle state.
    pub fn document(&self, id: ContentId) -> Option<IndexDocument> {
        self.documents.read().ok().and_then(|d| d.get(&id).cloned())
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored document, sorted by identifier.
    pub fn snapshot(&self) -> Vec<IndexDocument> {
        let mut docs: Vec<_> = self
            .documents
            .read()
            .map(|d| d.values().cloned().collect())
            .unwrap_or_default();
        docs.sort_by_key(|d| d.content_id);
        docs
    }

    pub fn upsert_count(&self) -> u64 {
        self.upserts.load(Ordering::Relaxed)
    }

    pub fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    pub fn stale_upsert_count(&self) -> u64 {
        self.stale_upserts.load(Ordering::Relaxed)
    }
}

fn lock_error() -> MarqueeError {
    MarqueeError::Index(IndexError::Connection {
        reason: "index lock poisoned".to_string(),
    })
}

#[async_trait]
impl crate::SearchIndex for InMemorySearchIndex {
    async fn upsert(&self, document: &IndexDocument) -> MarqueeResult<()> {
        let mut docs = self.documents.write().map_err(|_| lock_error())?;
        self.upserts.fetch_add(1, Ordering::Relaxed);
        if let Some(existing) = docs.get(&document.content_id) {
            if existing.version > document.version {
                self.stale_upserts.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    content_id = %document.content_id,
                    stored = existing.version,
                    incoming = document.version,
                    "Ignoring stale index upsert"
                );
                return Ok(());
            }
        }
        docs.insert(document.content_id, document.clone());
        Ok(())
    }

    async fn delete(&self, id: ContentId) -> MarqueeResult<()> {
        let mut docs = self.documents.write().map_err(|_| lock_error())?;
        self.deletes.fetch_add(1, Ordering::Relaxed);
        docs.remove(&id);
        Ok(())
    }

    async fn query(
        &self,
        filters: &SearchFilters,
        pagination: Pagination,
    ) -> MarqueeResult<SearchHits> {
        let docs = self.documents.read().map_err(|_| lock_error())?;
        let mut matches: Vec<&IndexDocument> = docs
            .values()
            .filter(|d| d.is_searchable() && filters.matches(d))
            .collect();
        matches.sort_by(|a, b| rank(a, b));

        Ok(SearchHits {
            total: matches.len(),
            ids: matches
                .into_iter()
                .skip(pagination.offset)
                .take(pagination.limit)
                .map(|d| d.content_id)
                .collect(),
        })
    }
}
