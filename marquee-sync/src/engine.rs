//! Composition root.
//!
//! [`SyncEngine`] wires the four gateways into the coordinator, hydrator,
//! discovery resolver and reindex worker. Every component of one engine
//! shares the same [`SyncMetrics`].

use std::sync::Arc;

use marquee_core::{
    ContentId, EntityIdType, HealthCheck, MarqueeResult, Pagination, SearchFilters, SyncConfig,
};
use marquee_storage::{CacheGateway, PrimaryStore, SearchIndex, TaskQueue};
use tokio::sync::watch;

use crate::coordinator::WriteCoordinator;
use crate::discovery::DiscoveryResolver;
use crate::hydrator::{ContentCatalog, ListGeneration, ReadHydrator};
use crate::import::ImportService;
use crate::metrics::SyncMetrics;
use crate::providers::ProviderRegistry;
use crate::worker::{index_lag_exceeded, ReindexPoolHandle, ReindexWorker, ReindexWorkerPool};

/// Gateway implementations the engine runs against.
#[derive(Clone)]
pub struct SyncPorts {
    pub store: Arc<dyn PrimaryStore>,
    pub cache: Arc<dyn CacheGateway>,
    pub index: Arc<dyn SearchIndex>,
    pub queue: Arc<dyn TaskQueue>,
}

pub struct SyncEngine {
    ports: SyncPorts,
    config: SyncConfig,
    metrics: Arc<SyncMetrics>,
    coordinator: Arc<WriteCoordinator>,
    hydrator: Arc<ReadHydrator>,
    discovery: Arc<DiscoveryResolver>,
    worker: Arc<ReindexWorker>,
}

impl SyncEngine {
    /// Validate the configuration and build every component.
    pub fn new(ports: SyncPorts, config: SyncConfig) -> MarqueeResult<Self> {
        config.validate()?;

        let metrics = Arc::new(SyncMetrics::new());
        let lists = Arc::new(ListGeneration::new());
        let coordinator = Arc::new(WriteCoordinator::new(
            ports.store.clone(),
            ports.cache.clone(),
            ports.queue.clone(),
            config.clone(),
            lists.clone(),
            metrics.clone(),
        ));
        let hydrator = Arc::new(ReadHydrator::new(
            ports.store.clone(),
            ports.cache.clone(),
            config.cache_ttl,
            lists,
            metrics.clone(),
        ));
        let catalog: Arc<dyn ContentCatalog> = hydrator.clone();
        let discovery = Arc::new(DiscoveryResolver::new(
            ports.index.clone(),
            catalog,
            metrics.clone(),
        ));
        let worker = Arc::new(ReindexWorker::new(
            ports.store.clone(),
            ports.index.clone(),
            ports.queue.clone(),
            config.index_retry.clone(),
            metrics.clone(),
        ));

        Ok(Self {
            ports,
            config,
            metrics,
            coordinator,
            hydrator,
            discovery,
            worker,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<SyncMetrics> {
        self.metrics.clone()
    }

    pub fn coordinator(&self) -> Arc<WriteCoordinator> {
        self.coordinator.clone()
    }

    pub fn hydrator(&self) -> Arc<ReadHydrator> {
        self.hydrator.clone()
    }

    /// The read-only port handed to other contexts.
    pub fn catalog(&self) -> Arc<dyn ContentCatalog> {
        self.hydrator.clone()
    }

    pub fn discovery(&self) -> Arc<DiscoveryResolver> {
        self.discovery.clone()
    }

    pub fn worker(&self) -> Arc<ReindexWorker> {
        self.worker.clone()
    }

    pub fn import_service(&self, registry: ProviderRegistry) -> ImportService {
        ImportService::new(registry, self.coordinator.clone(), self.hydrator.clone())
    }

    /// Spawn one reindex consumer per queue partition.
    pub fn start_workers(&self, shutdown_rx: watch::Receiver<bool>) -> ReindexPoolHandle {
        ReindexWorkerPool::new(self.worker.clone(), self.config.clone()).start(shutdown_rx)
    }

    /// Per-component health.
    ///
    /// The task queue is `Degraded` while enqueues are failing or while the
    /// oldest pending job is older than `max_index_lag`.
    pub async fn health(&self) -> Vec<HealthCheck> {
        vec![
            self.primary_store_health().await,
            self.cache_health(),
            self.search_index_health().await,
            self.task_queue_health().await,
        ]
    }

    async fn primary_store_health(&self) -> HealthCheck {
        match self.ports.store.content_get(ContentId::nil()).await {
            Ok(_) => HealthCheck::healthy("primary_store"),
            Err(e) => HealthCheck::unhealthy("primary_store", e.to_string()),
        }
    }

    fn cache_health(&self) -> HealthCheck {
        let snapshot = self.metrics.snapshot();
        HealthCheck::healthy("cache")
            .with_metadata("hits", snapshot.cache_hits.into())
            .with_metadata("misses", snapshot.cache_misses.into())
            .with_metadata("write_failures", snapshot.cache_failures.into())
    }

    async fn search_index_health(&self) -> HealthCheck {
        match self
            .ports
            .index
            .query(&SearchFilters::default(), Pagination::new(0, 0))
            .await
        {
            Ok(hits) => HealthCheck::healthy("search_index").with_metadata("documents", hits.total.into()),
            Err(e) if e.is_retryable() => HealthCheck::degraded("search_index", e.to_string()),
            Err(e) => HealthCheck::unhealthy("search_index", e.to_string()),
        }
    }

    async fn task_queue_health(&self) -> HealthCheck {
        let queue = self.ports.queue.as_ref();
        let (pending, dead_letters) = match (queue.pending().await, queue.dead_letters().await) {
            (Ok(pending), Ok(dead)) => (pending, dead.len()),
            (Err(e), _) | (_, Err(e)) => return HealthCheck::unhealthy("task_queue", e.to_string()),
        };

        let check = if self.metrics.is_queue_degraded() {
            HealthCheck::degraded("task_queue", "reindex jobs are failing to enqueue")
        } else if let Ok(Some(lag)) = index_lag_exceeded(queue, &self.config).await {
            HealthCheck::degraded(
                "task_queue",
                format!("search index lag {}ms exceeds bound", lag.as_millis()),
            )
        } else {
            HealthCheck::healthy("task_queue")
        };

        check
            .with_metadata("pending", pending.into())
            .with_metadata("dead_letters", dead_letters.into())
            .with_metadata(
                "enqueue_failures",
                self.metrics.snapshot().enqueue_failures.into(),
            )
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}
