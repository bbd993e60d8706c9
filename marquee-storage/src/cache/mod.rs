//! Cache gateway: deterministic keys, the gateway trait, and the LMDB adapter.

mod key;
mod lmdb;
mod traits;

pub use key::{CacheKey, CacheKeyParseError, CONTENT_LIST_PREFIX};
pub use lmdb::{LmdbCache, LmdbCacheConfig, LmdbCacheError, DEFAULT_LMDB_MAX_SIZE_MB};
pub use traits::{CacheGateway, CacheStats, FINAL_VERSION, TOMBSTONE};
