//! Core entity structures

use crate::{
    ContentId, EntityIdType, JobId, JobOperation, LifecycleState, MediaId, MediaProvider,
    MediaSource, MediaType, Timestamp,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Content - the editorial metadata aggregate and source of every projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub content_id: ContentId,
    pub title: String,
    pub description: Option<String>,
    /// Category names, trimmed and de-duplicated.
    pub categories: BTreeSet<String>,
    pub language: Option<String>,
    /// Duration in seconds.
    pub duration_secs: Option<u32>,
    pub publication_date: Option<NaiveDate>,
    pub state: LifecycleState,
    /// Bumped by the primary store on every write to the aggregate.
    pub version: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Content {
    pub fn is_published(&self) -> bool {
        self.state == LifecycleState::Published
    }
}

/// Media - the single asset attached to a Content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub media_id: MediaId,
    /// Owning content. At most one media per content.
    pub content_id: ContentId,
    pub media_type: MediaType,
    pub source: MediaSource,
    pub provider: MediaProvider,
    /// Storage path for uploads, URL for external media.
    pub locator: String,
    pub duration_secs: Option<u32>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Read model served to callers: content plus its optional media.
///
/// This is what lives under the `content:{id}` cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentProjection {
    #[serde(flatten)]
    pub content: Content,
    pub media: Option<Media>,
}

impl ContentProjection {
    pub fn new(content: Content, media: Option<Media>) -> Self {
        Self { content, media }
    }

    pub fn content_id(&self) -> ContentId {
        self.content.content_id
    }

    pub fn title(&self) -> &str {
        &self.content.title
    }

    pub fn is_published(&self) -> bool {
        self.content.is_published()
    }
}

/// Denormalized search document. Owned exclusively by the reindex worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub content_id: ContentId,
    pub title: String,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub language: Option<String>,
    pub media_type: Option<MediaType>,
    pub state: LifecycleState,
    pub publication_date: Option<NaiveDate>,
    pub created_at: Timestamp,
    pub version: u64,
}

impl IndexDocument {
    /// Build the search document for the current state of an aggregate.
    pub fn from_projection(projection: &ContentProjection) -> Self {
        let content = &projection.content;
        Self {
            content_id: content.content_id,
            title: content.title.clone(),
            description: content.description.clone(),
            categories: content.categories.iter().cloned().collect(),
            language: content.language.clone(),
            media_type: projection.media.as_ref().map(|m| m.media_type),
            state: content.state,
            publication_date: content.publication_date,
            created_at: content.created_at,
            version: content.version,
        }
    }

    /// Only published documents may appear in search results.
    pub fn is_searchable(&self) -> bool {
        self.state == LifecycleState::Published
    }
}

/// Asynchronous unit of work synchronizing one content's search document.
///
/// Jobs are idempotent: replaying one any number of times converges to the
/// same index state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexJob {
    pub job_id: JobId,
    pub content_id: ContentId,
    pub operation: JobOperation,
    pub enqueued_at: Timestamp,
}

impl ReindexJob {
    pub fn new(content_id: ContentId, operation: JobOperation) -> Self {
        Self {
            job_id: JobId::now_v7(),
            content_id,
            operation,
            enqueued_at: Utc::now(),
        }
    }

    /// Re-read the content and push its current state to the index.
    pub fn upsert(content_id: ContentId) -> Self {
        Self::new(content_id, JobOperation::Upsert)
    }

    /// Remove the content's document from the index.
    pub fn delete(content_id: ContentId) -> Self {
        Self::new(content_id, JobOperation::Delete)
    }
}

/// A job that exhausted its retry budget or failed permanently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub job: ReindexJob,
    pub reason: String,
    pub attempts: u32,
    pub dead_lettered_at: Timestamp,
}
