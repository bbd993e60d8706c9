//! JSON encoding of cached values.

use marquee_core::{CacheError, MarqueeResult};
use marquee_storage::CacheKey;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub(crate) fn encode<T: Serialize>(key: &CacheKey, value: &T) -> MarqueeResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        CacheError::Serialization {
            key: key.encode(),
            reason: e.to_string(),
        }
        .into()
    })
}

pub(crate) fn decode<T: DeserializeOwned>(key: &CacheKey, bytes: &[u8]) -> MarqueeResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        CacheError::Serialization {
            key: key.encode(),
            reason: e.to_string(),
        }
        .into()
    })
}
