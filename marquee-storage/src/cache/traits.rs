//! Cache gateway trait and statistics.

use std::time::Duration;

use ::async_trait::async_trait;
use marquee_core::MarqueeResult;
use serde::{Deserialize, Serialize};

use super::key::CacheKey;

/// Payload marking a deleted entity. A tombstoned key resolves to NotFound
/// without a primary-store read.
pub const TOMBSTONE: &[u8] = b"null";

/// Version that no committed write ever reaches. A tombstone written at this
/// version cannot be overwritten until it expires.
pub const FINAL_VERSION: u64 = u64::MAX;

/// Key/value cache with per-entry TTL, used cache-aside.
///
/// Every operation is best-effort. Callers treat errors as misses and must
/// never rely on the cache as the record of truth.
///
/// Entries carry the aggregate version they were built from. A versioned
/// write never replaces a live entry holding a newer version, so a slow
/// reader cannot clobber what a later commit put in place.
#[async_trait]
pub trait CacheGateway: Send + Sync {
    /// Fetch raw bytes. Expired entries read as `None`.
    async fn get(&self, key: &CacheKey) -> MarqueeResult<Option<Vec<u8>>>;

    /// Store raw bytes, replacing any existing entry.
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> MarqueeResult<()>;

    /// Store raw bytes built from `version`, unless a live entry already
    /// holds a newer one. Returns whether the value was written.
    async fn set_versioned(
        &self,
        key: &CacheKey,
        value: &[u8],
        version: u64,
        ttl: Duration,
    ) -> MarqueeResult<bool>;

    /// Remove an entry. Removing an absent key succeeds.
    async fn invalidate(&self, key: &CacheKey) -> MarqueeResult<()>;

    /// Remove every entry whose encoded key starts with `prefix`.
    /// Returns how many entries were removed.
    async fn invalidate_prefix(&self, prefix: &str) -> MarqueeResult<u64>;
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub invalidations: u64,
    /// Versioned writes refused because a newer entry was in place.
    pub stale_writes: u64,
    /// Entries found past their TTL on read.
    pub expired: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
