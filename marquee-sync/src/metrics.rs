//! Engine counters.
//!
//! Lock-free counters shared by every component of one engine. They are the
//! only mutable state request handlers share.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters for the write, read, discovery and reindex paths.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    /// Best-effort cache writes or invalidations that failed on the write path.
    pub cache_failures: AtomicU64,

    /// Enqueue attempts that were retried.
    pub enqueue_retries: AtomicU64,

    /// Mutations whose reindex job could not be enqueued after all retries.
    pub enqueue_failures: AtomicU64,

    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,

    /// Cache entries that could not be decoded and were treated as misses.
    pub cache_decode_errors: AtomicU64,

    /// Read-path populations refused because a newer entry was already cached.
    pub stale_populates: AtomicU64,

    /// Search hits dropped from a discovery page because hydration failed.
    pub hydration_drops: AtomicU64,

    /// Reindex jobs acked.
    pub jobs_processed: AtomicU64,

    /// In-process retries of transient reindex failures.
    pub index_retries: AtomicU64,

    pub dead_letters: AtomicU64,

    /// Lag checks that found the oldest pending job past the bound.
    pub lag_warnings: AtomicU64,

    /// Set when the last enqueue exhausted its retries, cleared by the next success.
    queue_degraded: AtomicBool,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_queue_degraded(&self, degraded: bool) {
        self.queue_degraded.store(degraded, Ordering::Relaxed);
    }

    /// Whether the write path is currently failing to enqueue reindex jobs.
    pub fn is_queue_degraded(&self) -> bool {
        self.queue_degraded.load(Ordering::Relaxed)
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        SyncMetricsSnapshot {
            cache_failures: self.cache_failures.load(Ordering::Relaxed),
            enqueue_retries: self.enqueue_retries.load(Ordering::Relaxed),
            enqueue_failures: self.enqueue_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_decode_errors: self.cache_decode_errors.load(Ordering::Relaxed),
            stale_populates: self.stale_populates.load(Ordering::Relaxed),
            hydration_drops: self.hydration_drops.load(Ordering::Relaxed),
            jobs_processed: self.jobs_processed.load(Ordering::Relaxed),
            index_retries: self.index_retries.load(Ordering::Relaxed),
            dead_letters: self.dead_letters.load(Ordering::Relaxed),
            lag_warnings: self.lag_warnings.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SyncMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetricsSnapshot {
    pub cache_failures: u64,
    pub enqueue_retries: u64,
    pub enqueue_failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_decode_errors: u64,
    pub stale_populates: u64,
    pub hydration_drops: u64,
    pub jobs_processed: u64,
    pub index_retries: u64,
    pub dead_letters: u64,
    pub lag_warnings: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = SyncMetrics::new();
        SyncMetrics::incr(&metrics.enqueue_failures);
        SyncMetrics::incr(&metrics.enqueue_failures);
        SyncMetrics::incr(&metrics.hydration_drops);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.enqueue_failures, 2);
        assert_eq!(snapshot.hydration_drops, 1);
        assert_eq!(snapshot.jobs_processed, 0);
    }

    #[test]
    fn test_queue_degraded_flag() {
        let metrics = SyncMetrics::new();
        assert!(!metrics.is_queue_degraded());
        metrics.set_queue_degraded(true);
        assert!(metrics.is_queue_degraded());
        metrics.set_queue_degraded(false);
        assert!(!metrics.is_queue_degraded());
    }
}
