//! Deterministic cache keys.
//!
//! An entity key is a pure function of entity type and content identifier,
//! so the write path and the read path always address the same entry.
//! List keys embed a generation so a mutation can retire every cached list
//! at once.

use std::fmt;
use std::str::FromStr;

use marquee_core::{ContentId, ContentListQuery, EntityType};

/// Separator between the segments of an encoded key.
const SEPARATOR: char = ':';

/// Shared prefix of every cached content listing.
pub const CONTENT_LIST_PREFIX: &str = "content:list:";

/// Cache key for a content projection, a media record or a content listing.
///
/// Media is keyed by its owning content identifier, since a content item has
/// at most one media.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `content:{id}`
    Content(ContentId),
    /// `media:{contentId}`
    Media(ContentId),
    /// `content:list:{generation}:{canonical query}`
    ContentList { generation: u64, query: String },
}

impl CacheKey {
    pub fn content(content_id: ContentId) -> Self {
        Self::Content(content_id)
    }

    pub fn media(content_id: ContentId) -> Self {
        Self::Media(content_id)
    }

    pub fn content_list(generation: u64, query: &ContentListQuery) -> Self {
        Self::ContentList {
            generation,
            query: query.canonical(),
        }
    }

    /// The content item an entity key belongs to. Listings have none.
    pub fn content_id(&self) -> Option<ContentId> {
        match self {
            Self::Content(id) | Self::Media(id) => Some(*id),
            Self::ContentList { .. } => None,
        }
    }

    /// Encode as the wire/storage key.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content(id) => write!(f, "{}{}{}", EntityType::Content, SEPARATOR, id),
            Self::Media(id) => write!(f, "{}{}{}", EntityType::Media, SEPARATOR, id),
            Self::ContentList { generation, query } => {
                write!(f, "{}{}{}{}", CONTENT_LIST_PREFIX, generation, SEPARATOR, query)
            }
        }
    }
}

/// Error when decoding a malformed cache key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid cache key: {0}")]
pub struct CacheKeyParseError(String);

impl FromStr for CacheKey {
    type Err = CacheKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CacheKeyParseError(s.to_string());

        if let Some(rest) = s.strip_prefix(CONTENT_LIST_PREFIX) {
            let (generation, query) = rest.split_once(SEPARATOR).ok_or_else(invalid)?;
            return Ok(Self::ContentList {
                generation: generation.parse().map_err(|_| invalid())?,
                query: query.to_string(),
            });
        }

        let (kind, id) = s.split_once(SEPARATOR).ok_or_else(invalid)?;
        let content_id = id.parse::<ContentId>().map_err(|_| invalid())?;
        match kind.parse::<EntityType>().map_err(|_| invalid())? {
            EntityType::Content => Ok(Self::Content(content_id)),
            EntityType::Media => Ok(Self::Media(content_id)),
        }
    }
}
