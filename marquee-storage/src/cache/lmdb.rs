//! LMDB-backed cache gateway.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a memory-mapped,
//! process-local key/value store that survives restarts.
//!
//! # Value format
//!
//! `[expires_at: 8 bytes, i64 millis LE][version: 8 bytes, u64 LE][payload]`
//!
//! Expired entries read as misses and are removed on the read that finds them.
//! Unversioned writes store version 0.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use marquee_core::{CacheError, ConfigError, MarqueeError, MarqueeResult};
use serde::{Deserialize, Serialize};

use super::key::CacheKey;
use super::traits::{CacheGateway, CacheStats};

const HEADER_LEN: usize = 16;

/// Default LMDB map size in megabytes.
pub const DEFAULT_LMDB_MAX_SIZE_MB: usize = 256;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored value is shorter than its header.
    #[error("Corrupt entry for {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for MarqueeError {
    fn from(e: LmdbCacheError) -> Self {
        match e {
            LmdbCacheError::Corrupt(key) => MarqueeError::Cache(CacheError::Serialization {
                key,
                reason: "entry shorter than header".to_string(),
            }),
            other => MarqueeError::Cache(CacheError::Unavailable {
                reason: other.to_string(),
            }),
        }
    }
}

/// LMDB cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LmdbCacheConfig {
    /// Directory holding the LMDB files. Created if missing.
    pub path: PathBuf,
    pub max_size_mb: usize,
}

impl Default for LmdbCacheConfig {
    fn default() -> Self {
        Self {
            path: std::env::temp_dir().join("marquee-cache"),
            max_size_mb: DEFAULT_LMDB_MAX_SIZE_MB,
        }
    }
}

impl LmdbCacheConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// - `MARQUEE_CACHE_PATH`: LMDB directory (default: `$TMPDIR/marquee-cache`)
    /// - `MARQUEE_CACHE_MAX_SIZE_MB`: map size (default: 256)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            path: std::env::var("MARQUEE_CACHE_PATH")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(defaults.path),
            max_size_mb: std::env::var("MARQUEE_CACHE_MAX_SIZE_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size_mb),
        }
    }

    pub fn validate(&self) -> MarqueeResult<()> {
        if self.max_size_mb == 0 {
            return Err(MarqueeError::Config(ConfigError::InvalidValue {
                field: "max_size_mb".to_string(),
                value: self.max_size_mb.to_string(),
                reason: "max_size_mb must be greater than 0".to_string(),
            }));
        }
        if self.path.as_os_str().is_empty() {
            return Err(MarqueeError::Config(ConfigError::MissingRequired {
                field: "path".to_string(),
            }));
        }
        Ok(())
    }
}

/// LMDB-backed cache gateway.
pub struct LmdbCache {
    env: Env,
    db: Database<Bytes, Bytes>,
    stats: Arc<RwLock<CacheStats>>,
}

impl LmdbCache {
    /// Open (or create) a cache in `path` with a map of `max_size_mb` megabytes.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per directory by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            stats: Arc::new(RwLock::new(CacheStats::default())),
        })
    }

    /// Open from validated configuration.
    pub fn open(config: &LmdbCacheConfig) -> MarqueeResult<Self> {
        config.validate()?;
        Ok(Self::new(&config.path, config.max_size_mb)?)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }

    fn collect_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, LmdbCacheError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let mut keys = Vec::new();
        for result in iter {
            let (key, _) = result.map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            if key.starts_with(prefix) {
                keys.push(key.to_vec());
            }
        }
        Ok(keys)
    }

    fn put(&self, key: &[u8], entry: &[u8]) -> Result<(), LmdbCacheError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        self.db
            .put(&mut wtxn, key, entry)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))
    }

    fn delete_raw(&self, key: &[u8]) -> Result<bool, LmdbCacheError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        let deleted = self
            .db
            .delete(&mut wtxn, key)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        Ok(deleted)
    }
}

fn encode_entry(value: &[u8], version: u64, ttl: Duration) -> Vec<u8> {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_ms);
    let mut bytes = Vec::with_capacity(HEADER_LEN + value.len());
    bytes.extend_from_slice(&expires_at.to_le_bytes());
    bytes.extend_from_slice(&version.to_le_bytes());
    bytes.extend_from_slice(value);
    bytes
}

/// Split a stored value into `(expires_at, version, payload)`.
fn decode_entry(bytes: &[u8]) -> Option<(i64, u64, &[u8])> {
    let expires_at = i64::from_le_bytes(bytes.get(..8)?.try_into().ok()?);
    let version = u64::from_le_bytes(bytes.get(8..HEADER_LEN)?.try_into().ok()?);
    Some((expires_at, version, &bytes[HEADER_LEN..]))
}

#[async_trait]
impl CacheGateway for LmdbCache {
    async fn get(&self, key: &CacheKey) -> MarqueeResult<Option<Vec<u8>>> {
        let encoded = key.encode();

        let (expires_at, payload) = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            let Some(bytes) = self
                .db
                .get(&rtxn, encoded.as_bytes())
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
            else {
                self.record(|s| s.misses += 1);
                return Ok(None);
            };
            let (expires_at, _, payload) =
                decode_entry(bytes).ok_or_else(|| LmdbCacheError::Corrupt(encoded.clone()))?;
            (expires_at, payload.to_vec())
        };

        if Utc::now().timestamp_millis() >= expires_at {
            self.delete_raw(encoded.as_bytes())?;
            self.record(|s| {
                s.misses += 1;
                s.expired += 1;
            });
            return Ok(None);
        }

        self.record(|s| s.hits += 1);
        Ok(Some(payload))
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> MarqueeResult<()> {
        self.put(key.encode().as_bytes(), &encode_entry(value, 0, ttl))?;
        self.record(|s| s.sets += 1);
        Ok(())
    }

    async fn set_versioned(
        &self,
        key: &CacheKey,
        value: &[u8],
        version: u64,
        ttl: Duration,
    ) -> MarqueeResult<bool> {
        let encoded = key.encode();
        let entry = encode_entry(value, version, ttl);

        // LMDB allows one writer at a time, so the compare and the put are atomic.
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        let newer_in_place = self
            .db
            .get(&wtxn, encoded.as_bytes())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
            .and_then(decode_entry)
            .is_some_and(|(expires_at, existing, _)| {
                Utc::now().timestamp_millis() < expires_at && existing > version
            });
        if newer_in_place {
            wtxn.abort();
            self.record(|s| s.stale_writes += 1);
            return Ok(false);
        }
        self.db
            .put(&mut wtxn, encoded.as_bytes(), &entry)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.record(|s| s.sets += 1);
        Ok(true)
    }

    async fn invalidate(&self, key: &CacheKey) -> MarqueeResult<()> {
        self.delete_raw(key.encode().as_bytes())?;
        self.record(|s| s.invalidations += 1);
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> MarqueeResult<u64> {
        let keys = self.collect_keys_with_prefix(prefix.as_bytes())?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        let mut deleted = 0u64;
        for key in &keys {
            if self
                .db
                .delete(&mut wtxn, key)
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
            {
                deleted += 1;
            }
        }
        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.record(|s| s.invalidations += deleted);
        Ok(deleted)
    }
}
