//! Import of externally hosted media.
//!
//! An import is an ordinary producer: it goes through the write coordinator
//! like any editor mutation, so caching and reindexing follow automatically.

use std::sync::Arc;

use marquee_core::{
    ContentDraft, ContentProjection, MarqueeError, MarqueeResult, MediaDraft, ProviderError,
};

use crate::coordinator::WriteCoordinator;
use crate::hydrator::ReadHydrator;
use crate::providers::{ExternalMediaItem, ProviderRegistry};

/// Creates content from external provider URLs.
pub struct ImportService {
    registry: ProviderRegistry,
    coordinator: Arc<WriteCoordinator>,
    hydrator: Arc<ReadHydrator>,
}

impl ImportService {
    pub fn new(
        registry: ProviderRegistry,
        coordinator: Arc<WriteCoordinator>,
        hydrator: Arc<ReadHydrator>,
    ) -> Self {
        Self {
            registry,
            coordinator,
            hydrator,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Import the item behind `url` as draft content with external media.
    ///
    /// Imported content stays a draft until an editor publishes it, so it is
    /// not discoverable right away. If the media cannot be attached, the
    /// content created for it is deleted again and the error is returned.
    pub async fn import_by_url(&self, url: &str) -> MarqueeResult<ContentProjection> {
        let url = url.trim();
        let provider = self
            .registry
            .resolve(url)
            .ok_or_else(|| MarqueeError::invalid("url", "unsupported url"))?;

        let item = provider.fetch(url).await?.ok_or_else(|| {
            MarqueeError::from(ProviderError::ItemNotFound {
                provider: provider.name().to_string(),
                url: url.to_string(),
            })
        })?;

        if item.title.trim().is_empty() {
            return Err(ProviderError::InvalidResponse {
                provider: provider.name().to_string(),
                reason: format!("item {} has no title", item.provider_id),
            }
            .into());
        }

        let content = self.coordinator.create_content(content_draft(&item)).await?;
        let content_id = content.content_id();

        // An import either yields content with its media or leaves nothing behind.
        if let Err(e) = self
            .coordinator
            .create_media(content_id, media_draft(&item))
            .await
        {
            tracing::warn!(
                content_id = %content_id,
                provider = provider.name(),
                error = %e,
                "Media attach failed, removing imported content"
            );
            if let Err(cleanup) = self.coordinator.delete_content(content_id).await {
                tracing::error!(
                    content_id = %content_id,
                    error = %cleanup,
                    "Failed to remove media-less imported content"
                );
            }
            return Err(e);
        }

        tracing::info!(
            content_id = %content_id,
            provider = provider.name(),
            provider_id = %item.provider_id,
            "External media imported"
        );
        self.hydrator.get(content_id).await
    }
}

fn content_draft(item: &ExternalMediaItem) -> ContentDraft {
    let mut draft = ContentDraft::new(item.title.clone()).with_categories(item.category.clone());
    if let Some(description) = &item.description {
        draft = draft.with_description(description.clone());
    }
    if let Some(language) = &item.language {
        draft = draft.with_language(language.clone());
    }
    if let Some(secs) = item.duration_secs {
        draft = draft.with_duration(secs);
    }
    if let Some(date) = item.publication_date {
        draft = draft.with_publication_date(date);
    }
    draft
}

fn media_draft(item: &ExternalMediaItem) -> MediaDraft {
    let draft = MediaDraft::external(item.media_type, item.provider, item.url.clone());
    match item.duration_secs {
        Some(secs) => draft.with_duration(secs),
        None => draft,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use marquee_core::{LifecycleState, MediaProvider, MediaSource, MediaType};

    fn item() -> ExternalMediaItem {
        ExternalMediaItem {
            provider: MediaProvider::Youtube,
            provider_id: "dQw4w9WgXcQ".into(),
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
            title: "Never Gonna Give You Up".into(),
            description: Some("Official video".into()),
            media_type: MediaType::Video,
            duration_secs: Some(213),
            language: Some("en".into()),
            category: Some("Music".into()),
            publication_date: NaiveDate::from_ymd_opt(2009, 10, 25),
            thumbnail_url: None,
        }
    }

    #[test]
    fn test_content_draft_is_draft_with_metadata() {
        let draft = content_draft(&item());
        assert_eq!(draft.state, LifecycleState::Draft);
        assert_eq!(draft.title, "Never Gonna Give You Up");
        assert_eq!(draft.categories, vec!["Music".to_string()]);
        assert_eq!(draft.duration_secs, Some(213));
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_media_draft_is_external() {
        let draft = media_draft(&item());
        assert_eq!(draft.source, MediaSource::External);
        assert_eq!(draft.provider, MediaProvider::Youtube);
        assert_eq!(draft.locator, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert!(draft.validate().is_ok());
    }
}
