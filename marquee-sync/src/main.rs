//! MARQUEE local deployment entry point.
//!
//! In-memory primary store, search index and task queue, LMDB cache.
//! Runs the reindex worker pool until Ctrl-C.

use std::sync::Arc;

use marquee_core::{overall_status, MarqueeResult, SyncConfig};
use marquee_storage::{
    InMemoryPrimaryStore, InMemorySearchIndex, InMemoryTaskQueue, LmdbCache, LmdbCacheConfig,
};
use marquee_sync::{init_tracing, SyncEngine, SyncPorts, TelemetryConfig};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> MarqueeResult<()> {
    init_tracing(&TelemetryConfig::from_env())?;

    let config = SyncConfig::from_env();
    let cache_config = LmdbCacheConfig::from_env();

    let queue = Arc::new(InMemoryTaskQueue::new(config.partitions));
    let ports = SyncPorts {
        store: Arc::new(InMemoryPrimaryStore::new()),
        cache: Arc::new(LmdbCache::open(&cache_config)?),
        index: Arc::new(InMemorySearchIndex::new()),
        queue: queue.clone(),
    };
    let engine = SyncEngine::new(ports, config)?;
    tracing::info!(
        partitions = engine.config().partitions,
        cache_path = %cache_config.path.display(),
        "Starting MARQUEE sync engine"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool = engine.start_workers(shutdown_rx);

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    queue.close();
    pool.join().await;

    let health = engine.health().await;
    tracing::info!(
        status = ?overall_status(&health),
        metrics = ?engine.metrics().snapshot(),
        "MARQUEE sync engine stopped"
    );
    Ok(())
}
