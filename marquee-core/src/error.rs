//! Error types for MARQUEE operations

use crate::EntityType;
use thiserror::Error;
use uuid::Uuid;

/// Primary store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Conflict on {entity_type}: {reason}")]
    Conflict { entity_type: EntityType, reason: String },

    #[error("Primary store connection failed: {reason}")]
    Connection { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Cache gateway errors. Callers treat every variant as a cache miss.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache serialization failed for {key}: {reason}")]
    Serialization { key: String, reason: String },
}

/// Search index errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("Search index connection failed: {reason}")]
    Connection { reason: String },

    #[error("Search index schema mismatch: {reason}")]
    Schema { reason: String },
}

/// Task queue errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Task queue unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Task queue closed")]
    Closed,

    #[error("Unknown partition {partition} (queue has {partitions})")]
    UnknownPartition { partition: usize, partitions: usize },
}

/// Validation errors. Raised before any store is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// External media provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Request to {provider} failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("{provider} has no item at {url}")]
    ItemNotFound { provider: String, url: String },
}

/// Coarse classification used to decide propagation and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Caller input malformed.
    Validation,
    /// Uniqueness or state violation in the primary store.
    Conflict,
    /// Identifier unknown.
    NotFound,
    /// A store is momentarily unreachable; retrying may succeed.
    TransientInfra,
    /// Schema mismatch, auth failure, closed channel; retrying will not help.
    PermanentInfra,
}

/// Master error type for all MARQUEE errors.
#[derive(Debug, Clone, Error)]
pub enum MarqueeError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl MarqueeError {
    /// Shorthand for a primary-store not-found error.
    pub fn not_found(entity_type: EntityType, id: Uuid) -> Self {
        MarqueeError::Storage(StoreError::NotFound { entity_type, id })
    }

    /// Shorthand for an invalid field value.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        MarqueeError::Validation(ValidationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            MarqueeError::Storage(StoreError::NotFound { .. }) => ErrorClass::NotFound,
            MarqueeError::Storage(StoreError::Conflict { .. }) => ErrorClass::Conflict,
            MarqueeError::Storage(StoreError::Connection { .. }) => ErrorClass::TransientInfra,
            MarqueeError::Storage(StoreError::LockPoisoned) => ErrorClass::PermanentInfra,
            MarqueeError::Cache(CacheError::Unavailable { .. }) => ErrorClass::TransientInfra,
            MarqueeError::Cache(CacheError::Serialization { .. }) => ErrorClass::PermanentInfra,
            MarqueeError::Index(IndexError::Connection { .. }) => ErrorClass::TransientInfra,
            MarqueeError::Index(IndexError::Schema { .. }) => ErrorClass::PermanentInfra,
            MarqueeError::Queue(QueueError::Unavailable { .. }) => ErrorClass::TransientInfra,
            MarqueeError::Queue(_) => ErrorClass::PermanentInfra,
            MarqueeError::Validation(_) => ErrorClass::Validation,
            MarqueeError::Config(_) => ErrorClass::Validation,
            MarqueeError::Provider(ProviderError::RequestFailed { .. }) => {
                ErrorClass::TransientInfra
            }
            MarqueeError::Provider(ProviderError::InvalidResponse { .. }) => {
                ErrorClass::PermanentInfra
            }
            MarqueeError::Provider(ProviderError::ItemNotFound { .. }) => ErrorClass::NotFound,
        }
    }

    /// Whether retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::TransientInfra
    }

    /// Whether this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }
}

/// Result type alias for MARQUEE operations.
pub type MarqueeResult<T> = Result<T, MarqueeError>;

// =============================================================================
// TESTS
// =============================================================================
