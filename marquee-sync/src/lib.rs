//! MARQUEE Sync - Write Coordination, Read Hydration and Reindexing
//!
//! Keeps the primary store, the cache and the search index consistent.
//! Writes commit to the primary store, refresh the cache, and enqueue a
//! reindex job. Reads go cache-aside. Discovery searches the index and
//! hydrates hits through the read path. Reindex workers drain the task queue
//! into the search index.

mod codec;

pub mod coordinator;
pub mod discovery;
pub mod engine;
pub mod hydrator;
pub mod import;
pub mod metrics;
pub mod providers;
pub mod retry;
pub mod telemetry;
pub mod worker;

pub use coordinator::WriteCoordinator;
pub use discovery::{DiscoveryPage, DiscoveryResolver};
pub use engine::{SyncEngine, SyncPorts};
pub use hydrator::{ContentCatalog, ListGeneration, ReadHydrator};
pub use import::ImportService;
pub use metrics::{SyncMetrics, SyncMetricsSnapshot};
pub use providers::{ExternalMediaItem, ExternalMediaProvider, ProviderRegistry, YouTubeProvider};
pub use retry::{retry_transient, RetryExhausted};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig, TelemetryError};
pub use worker::{JobOutcome, ReindexPoolHandle, ReindexWorker, ReindexWorkerPool};
