//! Configuration types

use crate::{ConfigError, MarqueeError, MarqueeResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default TTL for cached projections.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(120);

/// Default number of task queue partitions (and reindex consumers).
pub const DEFAULT_PARTITIONS: usize = 4;

/// Default acceptable age of the oldest pending reindex job.
pub const DEFAULT_MAX_INDEX_LAG: Duration = Duration::from_secs(60);

/// Default interval between index lag checks.
pub const DEFAULT_LAG_CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// Retry configuration with exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Retry policy that never waits. Used in tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay before retry number `attempt` (1-based), capped at `max_backoff`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let factor = f64::from(self.backoff_multiplier).powi(exponent);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    fn validate(&self, prefix: &str) -> MarqueeResult<()> {
        if self.backoff_multiplier < 1.0 {
            return Err(invalid(
                format!("{}.backoff_multiplier", prefix),
                self.backoff_multiplier.to_string(),
                "backoff_multiplier must be at least 1.0",
            ));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(invalid(
                format!("{}.initial_backoff", prefix),
                format!("{:?}", self.initial_backoff),
                "initial_backoff must not exceed max_backoff",
            ));
        }
        Ok(())
    }
}

fn invalid(field: impl Into<String>, value: String, reason: &str) -> MarqueeError {
    MarqueeError::Config(ConfigError::InvalidValue {
        field: field.into(),
        value,
        reason: reason.to_string(),
    })
}

/// Configuration of the consistency engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// TTL applied to every cache population.
    pub cache_ttl: Duration,
    /// Retry policy for enqueueing reindex jobs on the write path.
    pub enqueue_retry: RetryConfig,
    /// Retry policy for transient failures inside the reindex worker.
    pub index_retry: RetryConfig,
    /// Number of task queue partitions.
    pub partitions: usize,
    /// Oldest pending job age above which the queue reports degraded.
    pub max_index_lag: Duration,
    pub lag_check_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            enqueue_retry: RetryConfig::default(),
            index_retry: RetryConfig {
                max_retries: 5,
                initial_backoff: Duration::from_millis(200),
                max_backoff: Duration::from_secs(30),
                backoff_multiplier: 2.0,
            },
            partitions: DEFAULT_PARTITIONS,
            max_index_lag: DEFAULT_MAX_INDEX_LAG,
            lag_check_interval: DEFAULT_LAG_CHECK_INTERVAL,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl SyncConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `MARQUEE_CACHE_TTL_SECS` (default: 120)
    /// - `MARQUEE_ENQUEUE_MAX_RETRIES` (default: 3)
    /// - `MARQUEE_INDEX_MAX_RETRIES` (default: 5)
    /// - `MARQUEE_PARTITIONS` (default: 4)
    /// - `MARQUEE_MAX_INDEX_LAG_SECS` (default: 60)
    /// - `MARQUEE_LAG_CHECK_INTERVAL_SECS` (default: 15)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache_ttl: env_parse("MARQUEE_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            enqueue_retry: RetryConfig {
                max_retries: env_parse("MARQUEE_ENQUEUE_MAX_RETRIES")
                    .unwrap_or(defaults.enqueue_retry.max_retries),
                ..defaults.enqueue_retry
            },
            index_retry: RetryConfig {
                max_retries: env_parse("MARQUEE_INDEX_MAX_RETRIES")
                    .unwrap_or(defaults.index_retry.max_retries),
                ..defaults.index_retry
            },
            partitions: env_parse("MARQUEE_PARTITIONS").unwrap_or(defaults.partitions),
            max_index_lag: env_parse("MARQUEE_MAX_INDEX_LAG_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_index_lag),
            lag_check_interval: env_parse("MARQUEE_LAG_CHECK_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.lag_check_interval),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_enqueue_retry(mut self, retry: RetryConfig) -> Self {
        self.enqueue_retry = retry;
        self
    }

    pub fn with_index_retry(mut self, retry: RetryConfig) -> Self {
        self.index_retry = retry;
        self
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_max_index_lag(mut self, lag: Duration) -> Self {
        self.max_index_lag = lag;
        self
    }

    pub fn with_lag_check_interval(mut self, interval: Duration) -> Self {
        self.lag_check_interval = interval;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - cache_ttl is positive
    /// - partitions > 0
    /// - max_index_lag and lag_check_interval are positive
    /// - both retry policies have a multiplier >= 1.0 and ordered backoffs
    pub fn validate(&self) -> MarqueeResult<()> {
        if self.cache_ttl.is_zero() {
            return Err(invalid(
                "cache_ttl",
                format!("{:?}", self.cache_ttl),
                "cache_ttl must be positive",
            ));
        }

        if self.partitions == 0 {
            return Err(invalid(
                "partitions",
                self.partitions.to_string(),
                "partitions must be greater than 0",
            ));
        }

        if self.max_index_lag.is_zero() {
            return Err(invalid(
                "max_index_lag",
                format!("{:?}", self.max_index_lag),
                "max_index_lag must be positive",
            ));
        }

        if self.lag_check_interval.is_zero() {
            return Err(invalid(
                "lag_check_interval",
                format!("{:?}", self.lag_check_interval),
                "lag_check_interval must be positive",
            ));
        }

        self.enqueue_retry.validate("enqueue_retry")?;
        self.index_retry.validate("index_retry")
    }
}
