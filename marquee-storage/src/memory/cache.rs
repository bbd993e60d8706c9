//! In-memory cache gateway with TTL.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use marquee_core::MarqueeResult;
use tokio::time::Instant;

use crate::cache::{CacheGateway, CacheKey, CacheStats, TOMBSTONE};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    version: u64,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Cache held in a concurrent map. Expiry follows the tokio clock, so
/// paused-time tests can advance past a TTL.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<CacheKey, Entry>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    stale_writes: AtomicU64,
    invalidations: AtomicU64,
    expired: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live entry holds a value, without touching statistics.
    /// Tombstones do not count.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.peek(key).is_some_and(|(value, _)| value != TOMBSTONE)
    }

    /// Whether a live tombstone sits under `key`.
    pub fn is_tombstoned(&self, key: &CacheKey) -> bool {
        self.peek(key).is_some_and(|(value, _)| value == TOMBSTONE)
    }

    /// Version of the live entry under `key`, without touching statistics.
    pub fn version(&self, key: &CacheKey) -> Option<u64> {
        self.peek(key).map(|(_, version)| version)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            stale_writes: self.stale_writes.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }

    fn peek(&self, key: &CacheKey) -> Option<(Vec<u8>, u64)> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| (e.value.clone(), e.version))
    }

    fn entry(value: &[u8], version: u64, ttl: Duration) -> Entry {
        Entry {
            value: value.to_vec(),
            version,
            expires_at: Instant::now() + ttl,
        }
    }
}

#[async_trait]
impl CacheGateway for InMemoryCache {
    async fn get(&self, key: &CacheKey) -> MarqueeResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let found = self.entries.get(key).map(|e| (e.value.clone(), e.is_live(now)));
        match found {
            Some((value, true)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            Some((_, false)) => {
                self.entries.remove_if(key, |_, e| !e.is_live(now));
                self.expired.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> MarqueeResult<()> {
        self.entries.insert(key.clone(), Self::entry(value, 0, ttl));
        self.sets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn set_versioned(
        &self,
        key: &CacheKey,
        value: &[u8],
        version: u64,
        ttl: Duration,
    ) -> MarqueeResult<bool> {
        let now = Instant::now();
        // The shard lock is held across the compare and the write.
        match self.entries.entry(key.clone()) {
            MapEntry::Occupied(existing)
                if existing.get().is_live(now) && existing.get().version > version =>
            {
                self.stale_writes.fetch_add(1, Ordering::Relaxed);
                return Ok(false);
            }
            MapEntry::Occupied(mut existing) => {
                existing.insert(Self::entry(value, version, ttl));
            }
            MapEntry::Vacant(slot) => {
                slot.insert(Self::entry(value, version, ttl));
            }
        }
        self.sets.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    async fn invalidate(&self, key: &CacheKey) -> MarqueeResult<()> {
        self.entries.remove(key);
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> MarqueeResult<u64> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.encode().starts_with(prefix));
        let removed = before.saturating_sub(self.entries.len()) as u64;
        self.invalidations.fetch_add(removed, Ordering::Relaxed);
        Ok(removed)
    }
}
