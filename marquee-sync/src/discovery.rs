//! Discovery resolver: search, then hydrate.

use std::sync::Arc;

use futures_util::future::join_all;
use marquee_core::{ContentProjection, MarqueeResult, Pagination, SearchFilters};
use marquee_storage::SearchIndex;
use serde::{Deserialize, Serialize};

use crate::hydrator::ContentCatalog;
use crate::metrics::SyncMetrics;

/// One page of discovery results.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiscoveryPage {
    /// Hit count reported by the index, ignoring pagination and drops.
    pub total: usize,
    /// Hydrated projections in index ranking order. May be shorter than the
    /// page size when hits fail to hydrate.
    pub items: Vec<ContentProjection>,
}

/// Resolves discovery queries against the search index and hydrates the hits.
pub struct DiscoveryResolver {
    index: Arc<dyn SearchIndex>,
    catalog: Arc<dyn ContentCatalog>,
    metrics: Arc<SyncMetrics>,
}

impl DiscoveryResolver {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        catalog: Arc<dyn ContentCatalog>,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            index,
            catalog,
            metrics,
        }
    }

    /// Run a discovery query.
    ///
    /// Pagination goes to the index untouched and the index ranking is kept.
    /// Index errors fail the request; hydration errors only drop the hit.
    pub async fn search(
        &self,
        filters: &SearchFilters,
        pagination: Pagination,
    ) -> MarqueeResult<DiscoveryPage> {
        let hits = self.index.query(filters, pagination).await?;

        let hydrated = join_all(hits.ids.iter().map(|id| self.catalog.get_by_id(*id))).await;

        let mut items = Vec::with_capacity(hydrated.len());
        for (id, result) in hits.ids.iter().zip(hydrated) {
            match result {
                // The index can lag an unpublish; the projection is authoritative.
                Ok(projection) if projection.is_published() => items.push(projection),
                Ok(_) => {
                    SyncMetrics::incr(&self.metrics.hydration_drops);
                    tracing::debug!(content_id = %id, "Dropping unpublished hit");
                }
                Err(e) if e.is_not_found() => {
                    SyncMetrics::incr(&self.metrics.hydration_drops);
                    tracing::debug!(content_id = %id, "Dropping hit for deleted content");
                }
                Err(e) => {
                    SyncMetrics::incr(&self.metrics.hydration_drops);
                    tracing::warn!(content_id = %id, error = %e, "Dropping hit that failed to hydrate");
                }
            }
        }

        Ok(DiscoveryPage {
            total: hits.total,
            items,
        })
    }
}
