//! MARQUEE Storage - Gateway Traits and Adapters
//!
//! Ports for the four stores the engine keeps consistent (primary store,
//! cache, search index, task queue), plus an LMDB cache and in-memory
//! adapters for each.

pub mod cache;
pub mod index;
pub mod memory;
pub mod primary;
pub mod queue;

pub use cache::{
    CacheGateway, CacheKey, CacheStats, LmdbCache, LmdbCacheConfig, LmdbCacheError,
    CONTENT_LIST_PREFIX, FINAL_VERSION, TOMBSTONE,
};
pub use index::SearchIndex;
pub use memory::{
    InMemoryCache, InMemoryPrimaryStore, InMemorySearchIndex, InMemoryTaskQueue, QueueStats,
};
pub use primary::PrimaryStore;
pub use queue::{consume, partition_for, Delivery, TaskQueue};
