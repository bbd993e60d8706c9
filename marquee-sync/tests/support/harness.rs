//! Engine wired to in-memory gateways, with a synchronous reindex drain.

#![allow(dead_code)]

use std::sync::Arc;

use marquee_core::{ContentDraft, ContentProjection, SyncConfig};
use marquee_storage::{
    InMemoryCache, InMemoryPrimaryStore, InMemorySearchIndex, InMemoryTaskQueue, TaskQueue,
};
use marquee_sync::{JobOutcome, SyncEngine, SyncPorts};
use marquee_test_utils::doubles::CountingStore;
use marquee_test_utils::fixtures;
use tokio::sync::watch;

pub struct Harness {
    pub engine: SyncEngine,
    pub store: Arc<CountingStore>,
    pub cache: Arc<InMemoryCache>,
    pub index: Arc<InMemorySearchIndex>,
    pub queue: Arc<InMemoryTaskQueue>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(fixtures::fast_config(), |_| {})
    }

    /// Build with the default in-memory ports, letting the caller swap any of
    /// them for a fault-injecting double before the engine is created.
    pub fn build(config: SyncConfig, customize: impl FnOnce(&mut SyncPorts)) -> Self {
        let store = Arc::new(CountingStore::new(Arc::new(InMemoryPrimaryStore::new())));
        let cache = Arc::new(InMemoryCache::new());
        let index = Arc::new(InMemorySearchIndex::new());
        let queue = Arc::new(InMemoryTaskQueue::new(config.partitions));

        let mut ports = SyncPorts {
            store: store.clone(),
            cache: cache.clone(),
            index: index.clone(),
            queue: queue.clone(),
        };
        customize(&mut ports);

        let engine = SyncEngine::new(ports, config).expect("valid test config");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            engine,
            store,
            cache,
            index,
            queue,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Process every queued reindex job in delivery order.
    pub async fn drain(&mut self) -> Vec<JobOutcome> {
        let worker = self.engine.worker();
        let mut outcomes = Vec::new();
        loop {
            let mut progressed = false;
            for partition in 0..self.queue.partitions() {
                if self.queue.queued_jobs(partition).await.unwrap().is_empty() {
                    continue;
                }
                let delivery = self.queue.receive(partition).await.unwrap().unwrap();
                outcomes.push(worker.process(delivery, &mut self.shutdown_rx).await.unwrap());
                progressed = true;
            }
            if !progressed {
                return outcomes;
            }
        }
    }

    /// Create through the write path and run the resulting reindex job.
    pub async fn create_indexed(&mut self, draft: ContentDraft) -> ContentProjection {
        let projection = self.engine.coordinator().create_content(draft).await.unwrap();
        self.drain().await;
        projection
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
