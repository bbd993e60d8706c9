//! End-to-end scenarios across write path, reindexing, discovery and import.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use marquee_core::{
    ContentDraft, ContentPatch, JobOperation, LifecycleState, MarqueeError, MarqueeResult,
    MediaProvider, MediaSource, MediaType, Pagination, ProviderError, SearchFilters,
};
use marquee_storage::{CacheKey, PrimaryStore, TaskQueue};
use marquee_sync::{ExternalMediaItem, ExternalMediaProvider, ProviderRegistry, YouTubeProvider};
use marquee_test_utils::assertions::{assert_not_found, assert_validation_error};
use marquee_test_utils::doubles::{Fault, FlakySearchIndex};
use marquee_test_utils::{fixtures, ErrorClass, InMemorySearchIndex};

#[path = "support/harness.rs"]
mod harness;
use harness::Harness;

fn dated(title: &str, year: i32, month: u32) -> ContentDraft {
    ContentDraft::new(title)
        .with_publication_date(NaiveDate::from_ymd_opt(year, month, 1).unwrap())
        .published()
}

#[tokio::test]
async fn test_create_index_search_get() {
    let mut h = Harness::new();
    let created = h
        .engine
        .coordinator()
        .create_content(ContentDraft::new("Ep1").published())
        .await
        .unwrap();
    let id = created.content_id();

    assert!(h.cache.contains(&CacheKey::content(id)));
    let jobs = h.queue.queued_jobs(0).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].content_id, id);

    h.drain().await;

    let page = h
        .engine
        .discovery()
        .search(&SearchFilters::text("Ep1"), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].content_id(), id);

    let reads_before = h.store.content_reads();
    let fetched = h.engine.hydrator().get(id).await.unwrap();
    assert_eq!(fetched.title(), "Ep1");
    assert_eq!(h.store.content_reads(), reads_before, "served from cache");
}

#[tokio::test]
async fn test_delete_hides_content_before_reindex() {
    let mut h = Harness::new();
    let id = h
        .create_indexed(ContentDraft::new("Ep1").published())
        .await
        .content_id();

    h.engine.coordinator().delete_content(id).await.unwrap();

    assert!(!h.cache.contains(&CacheKey::content(id)));
    assert_eq!(h.queue.pending().await.unwrap(), 1);
    assert!(h.index.document(id).is_some(), "delete job has not run yet");
    assert_not_found(&h.engine.hydrator().get(id).await);

    // Discovery already drops the stale hit.
    let page = h
        .engine
        .discovery()
        .search(&SearchFilters::text("Ep1"), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(page.items.is_empty());

    h.drain().await;
    assert!(h.index.document(id).is_none());
}

#[tokio::test]
async fn test_discovery_keeps_index_order_when_hits_drop() {
    let mut h = Harness::new();
    let a = h.create_indexed(dated("Show A", 2024, 4)).await.content_id();
    let b = h.create_indexed(dated("Show B", 2024, 3)).await.content_id();
    let c = h.create_indexed(dated("Show C", 2024, 2)).await.content_id();
    let d = h.create_indexed(dated("Show D", 2024, 1)).await.content_id();

    let coordinator = h.engine.coordinator();
    coordinator
        .update_content(b, ContentPatch::state(LifecycleState::Draft))
        .await
        .unwrap();
    coordinator.delete_content(c).await.unwrap();

    let page = h
        .engine
        .discovery()
        .search(&SearchFilters::text("Show"), Pagination::default())
        .await
        .unwrap();

    assert_eq!(page.total, 4);
    let ids: Vec<_> = page.items.iter().map(|p| p.content_id()).collect();
    assert_eq!(ids, vec![a, d]);
    assert_eq!(h.engine.metrics().snapshot().hydration_drops, 2);
}

#[tokio::test]
async fn test_drafts_never_discoverable() {
    let mut h = Harness::new();
    h.create_indexed(fixtures::draft_episode("Hidden pilot")).await;
    h.create_indexed(fixtures::published_episode("Public pilot")).await;

    let page = h
        .engine
        .discovery()
        .search(&SearchFilters::text("pilot"), Pagination::default())
        .await
        .unwrap();

    assert_eq!(page.total, 1);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].title(), "Public pilot");
    assert!(page.items.iter().all(|p| p.is_published()));
}

#[tokio::test]
async fn test_discovery_filters_and_pagination() {
    let mut h = Harness::new();
    let coordinator = h.engine.coordinator();
    let video = h.create_indexed(dated("Morning news", 2024, 5)).await.content_id();
    coordinator.create_media(video, fixtures::video_upload()).await.unwrap();
    let audio = h.create_indexed(dated("Evening news", 2024, 4)).await.content_id();
    coordinator.create_media(audio, fixtures::audio_upload()).await.unwrap();
    h.create_indexed(dated("Late news", 2024, 3)).await;
    h.drain().await;

    let discovery = h.engine.discovery();
    let videos = discovery
        .search(
            &SearchFilters::text("news").with_media_type(MediaType::Video),
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(videos.total, 1);
    assert_eq!(videos.items[0].content_id(), video);

    let second_page = discovery
        .search(&SearchFilters::text("news"), Pagination::new(1, 1))
        .await
        .unwrap();
    assert_eq!(second_page.total, 3);
    assert_eq!(second_page.items.len(), 1);
    assert_eq!(second_page.items[0].content_id(), audio);
}

#[tokio::test]
async fn test_index_outage_fails_search() {
    let inner = Arc::new(InMemorySearchIndex::new());
    let flaky = Arc::new(FlakySearchIndex::new(inner, Fault::Transient, 0));
    let port = flaky.clone();
    let h = Harness::build(fixtures::fast_config(), move |ports| ports.index = port);

    flaky.set_fail_queries(true);
    let result = h
        .engine
        .discovery()
        .search(&SearchFilters::default(), Pagination::default())
        .await;
    marquee_test_utils::assertions::assert_class(&result, ErrorClass::TransientInfra);
}

// ============================================================================
// IMPORT
// ============================================================================

struct StubProvider {
    item: Option<ExternalMediaItem>,
}

#[async_trait]
impl ExternalMediaProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports(&self, url: &str) -> bool {
        url.starts_with("https://videos.example/")
    }

    async fn fetch(&self, _url: &str) -> MarqueeResult<Option<ExternalMediaItem>> {
        Ok(self.item.clone())
    }
}

fn stub_item() -> ExternalMediaItem {
    ExternalMediaItem {
        provider: MediaProvider::Youtube,
        provider_id: "abc123def45".into(),
        url: "https://www.youtube.com/watch?v=abc123def45".into(),
        title: "Imported talk".into(),
        description: Some("A talk".into()),
        media_type: MediaType::Video,
        duration_secs: Some(600),
        language: Some("en".into()),
        category: None,
        publication_date: NaiveDate::from_ymd_opt(2023, 6, 1),
        thumbnail_url: None,
    }
}

fn registry(item: Option<ExternalMediaItem>) -> ProviderRegistry {
    ProviderRegistry::new(vec![Arc::new(StubProvider { item })])
}

#[tokio::test]
async fn test_import_creates_draft_with_external_media() {
    let mut h = Harness::new();
    let import = h.engine.import_service(registry(Some(stub_item())));

    let projection = import
        .import_by_url("https://videos.example/talk")
        .await
        .unwrap();

    assert_eq!(projection.title(), "Imported talk");
    assert_eq!(projection.content.state, LifecycleState::Draft);
    assert_eq!(projection.content.duration_secs, Some(600));
    let media = projection.media.clone().unwrap();
    assert_eq!(media.source, MediaSource::External);
    assert_eq!(media.provider, MediaProvider::Youtube);
    assert_eq!(media.locator, "https://www.youtube.com/watch?v=abc123def45");

    // Drafts are indexed as absent.
    h.drain().await;
    assert!(h.index.document(projection.content_id()).is_none());
    assert_eq!(h.engine.hydrator().get(projection.content_id()).await.unwrap(), projection);
}

#[tokio::test]
async fn test_import_unsupported_url_is_validation_error() {
    let h = Harness::new();
    let import = h.engine.import_service(registry(Some(stub_item())));

    assert_validation_error(&import.import_by_url("https://vimeo.com/1").await);
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn test_import_missing_item_is_not_found() {
    let h = Harness::new();
    let import = h.engine.import_service(registry(None));

    assert_not_found(&import.import_by_url("https://videos.example/gone").await);
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn test_import_with_unattachable_media_leaves_nothing_behind() {
    let h = Harness::new();
    let mut item = stub_item();
    item.url = "not-a-url".into();
    let import = h.engine.import_service(registry(Some(item)));

    assert_validation_error(&import.import_by_url("https://videos.example/talk").await);

    let jobs = h.queue.queued_jobs(0).await.unwrap();
    assert_eq!(jobs.len(), 2);
    let id = jobs[0].content_id;
    assert_eq!(jobs[1].operation, JobOperation::Delete);
    assert!(h.store.content_get(id).await.unwrap().is_none());
    assert_not_found(&h.engine.hydrator().get(id).await);
}

#[tokio::test]
async fn test_import_untitled_item_is_provider_error() {
    let h = Harness::new();
    let mut item = stub_item();
    item.title = "  ".into();
    let import = h.engine.import_service(registry(Some(item)));

    let err = import
        .import_by_url("https://videos.example/talk")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MarqueeError::Provider(ProviderError::InvalidResponse { .. })
    ));
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn test_youtube_provider_registers_for_youtube_urls() {
    let registry = ProviderRegistry::new(vec![Arc::new(YouTubeProvider::new("test-key"))]);
    let provider = registry
        .resolve("https://youtu.be/dQw4w9WgXcQ")
        .expect("youtube url resolves");
    assert_eq!(provider.name(), "youtube");
    assert!(registry.resolve("https://videos.example/talk").is_none());
}
