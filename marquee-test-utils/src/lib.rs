//! MARQUEE Test Utilities
//!
//! Shared test infrastructure for the MARQUEE workspace:
//! - Proptest generators for mutation payloads
//! - Fixtures for common content and configurations
//! - Fault-injecting gateway doubles
//! - Assertions on error classes

pub use marquee_core::{
    Content, ContentDraft, ContentId, ContentPatch, ContentProjection, EntityIdType, ErrorClass,
    LifecycleState, MarqueeError, MarqueeResult, MediaDraft, MediaProvider, MediaType,
    RetryConfig, SyncConfig,
};
pub use marquee_storage::{
    InMemoryCache, InMemoryPrimaryStore, InMemorySearchIndex, InMemoryTaskQueue,
};

// ============================================================================
// FAULT-INJECTING GATEWAYS
// ============================================================================

pub mod doubles {
    //! Gateway wrappers that fail on demand and count calls.

    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use marquee_core::{
        CacheError, Content, ContentId, ContentListQuery, ContentPage, ContentPatch,
        ContentProjection, DeadLetter, IndexDocument, IndexError, MarqueeError, MarqueeResult,
        Media, MediaPatch, Pagination, QueueError, ReindexJob, SearchFilters, SearchHits,
        StoreError, Timestamp,
    };
    use tokio::sync::Notify;
    use marquee_storage::{
        CacheGateway, CacheKey, Delivery, PrimaryStore, SearchIndex, TaskQueue,
    };

    /// Whether an injected failure is worth retrying.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Fault {
        /// Connection-style failure.
        Transient,
        /// Schema or closed-channel failure.
        Permanent,
    }

    const INJECTED: &str = "injected fault";

    fn take_one(remaining: &AtomicU32) -> bool {
        remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    // === Search index ===

    /// Search index whose next `n` writes fail, after which it delegates.
    pub struct FlakySearchIndex {
        inner: Arc<dyn SearchIndex>,
        fault: Fault,
        remaining: AtomicU32,
        fail_queries: AtomicBool,
        write_attempts: AtomicU64,
    }

    impl FlakySearchIndex {
        pub fn new(inner: Arc<dyn SearchIndex>, fault: Fault, failures: u32) -> Self {
            Self {
                inner,
                fault,
                remaining: AtomicU32::new(failures),
                fail_queries: AtomicBool::new(false),
                write_attempts: AtomicU64::new(0),
            }
        }

        /// Every write fails.
        pub fn always(inner: Arc<dyn SearchIndex>, fault: Fault) -> Self {
            Self::new(inner, fault, u32::MAX)
        }

        pub fn set_failures(&self, failures: u32) {
            self.remaining.store(failures, Ordering::SeqCst);
        }

        pub fn set_fail_queries(&self, fail: bool) {
            self.fail_queries.store(fail, Ordering::SeqCst);
        }

        /// Upserts and deletes attempted, failed or not.
        pub fn write_attempts(&self) -> u64 {
            self.write_attempts.load(Ordering::SeqCst)
        }

        fn error(&self) -> MarqueeError {
            let reason = INJECTED.to_string();
            match self.fault {
                Fault::Transient => IndexError::Connection { reason }.into(),
                Fault::Permanent => IndexError::Schema { reason }.into(),
            }
        }

        fn write_fault(&self) -> MarqueeResult<()> {
            self.write_attempts.fetch_add(1, Ordering::SeqCst);
            if take_one(&self.remaining) {
                return Err(self.error());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SearchIndex for FlakySearchIndex {
        async fn upsert(&self, document: &IndexDocument) -> MarqueeResult<()> {
            self.write_fault()?;
            self.inner.upsert(document).await
        }

        async fn delete(&self, id: ContentId) -> MarqueeResult<()> {
            self.write_fault()?;
            self.inner.delete(id).await
        }

        async fn query(
            &self,
            filters: &SearchFilters,
            pagination: Pagination,
        ) -> MarqueeResult<SearchHits> {
            if self.fail_queries.load(Ordering::SeqCst) {
                return Err(self.error());
            }
            self.inner.query(filters, pagination).await
        }
    }

    // === Cache ===

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum CacheFault {
        /// Every operation fails with `Unavailable`.
        Unavailable,
        /// Reads return bytes that do not decode. Writes succeed and are dropped.
        Garbage,
    }

    /// Cache that never works.
    #[derive(Debug)]
    pub struct FailingCache {
        fault: CacheFault,
        gets: AtomicU64,
        sets: AtomicU64,
        invalidations: AtomicU64,
    }

    impl FailingCache {
        pub fn new(fault: CacheFault) -> Self {
            Self {
                fault,
                gets: AtomicU64::new(0),
                sets: AtomicU64::new(0),
                invalidations: AtomicU64::new(0),
            }
        }

        pub fn unavailable() -> Self {
            Self::new(CacheFault::Unavailable)
        }

        pub fn garbage() -> Self {
            Self::new(CacheFault::Garbage)
        }

        pub fn gets(&self) -> u64 {
            self.gets.load(Ordering::SeqCst)
        }

        pub fn sets(&self) -> u64 {
            self.sets.load(Ordering::SeqCst)
        }

        pub fn invalidations(&self) -> u64 {
            self.invalidations.load(Ordering::SeqCst)
        }

        fn outcome(&self) -> MarqueeResult<()> {
            match self.fault {
                CacheFault::Unavailable => Err(CacheError::Unavailable {
                    reason: INJECTED.to_string(),
                }
                .into()),
                CacheFault::Garbage => Ok(()),
            }
        }
    }

    #[async_trait]
    impl CacheGateway for FailingCache {
        async fn get(&self, _key: &CacheKey) -> MarqueeResult<Option<Vec<u8>>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.outcome()?;
            Ok(Some(b"\xffnot json".to_vec()))
        }

        async fn set(&self, _key: &CacheKey, _value: &[u8], _ttl: Duration) -> MarqueeResult<()> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.outcome()
        }

        async fn set_versioned(
            &self,
            _key: &CacheKey,
            _value: &[u8],
            _version: u64,
            _ttl: Duration,
        ) -> MarqueeResult<bool> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.outcome().map(|()| true)
        }

        async fn invalidate(&self, _key: &CacheKey) -> MarqueeResult<()> {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
            self.outcome()
        }

        async fn invalidate_prefix(&self, _prefix: &str) -> MarqueeResult<u64> {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
            self.outcome().map(|()| 0)
        }
    }

    // === Task queue ===

    /// Task queue whose `enqueue` fails while the fault is switched on.
    /// Everything else delegates.
    pub struct FailingQueue {
        inner: Arc<dyn TaskQueue>,
        fault: Fault,
        failing: AtomicBool,
        enqueue_attempts: AtomicU64,
    }

    impl FailingQueue {
        /// Starts out failing.
        pub fn new(inner: Arc<dyn TaskQueue>, fault: Fault) -> Self {
            Self {
                inner,
                fault,
                failing: AtomicBool::new(true),
                enqueue_attempts: AtomicU64::new(0),
            }
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn enqueue_attempts(&self) -> u64 {
            self.enqueue_attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskQueue for FailingQueue {
        fn partitions(&self) -> usize {
            self.inner.partitions()
        }

        async fn enqueue(&self, job: ReindexJob) -> MarqueeResult<()> {
            self.enqueue_attempts.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(match self.fault {
                    Fault::Transient => QueueError::Unavailable {
                        reason: INJECTED.to_string(),
                    }
                    .into(),
                    Fault::Permanent => QueueError::Closed.into(),
                });
            }
            self.inner.enqueue(job).await
        }

        async fn receive(&self, partition: usize) -> MarqueeResult<Option<Delivery>> {
            self.inner.receive(partition).await
        }

        async fn ack(&self, delivery: &Delivery) -> MarqueeResult<()> {
            self.inner.ack(delivery).await
        }

        async fn nack(&self, delivery: Delivery) -> MarqueeResult<()> {
            self.inner.nack(delivery).await
        }

        async fn dead_letter(
            &self,
            delivery: Delivery,
            reason: String,
            attempts: u32,
        ) -> MarqueeResult<()> {
            self.inner.dead_letter(delivery, reason, attempts).await
        }

        async fn pending(&self) -> MarqueeResult<usize> {
            self.inner.pending().await
        }

        async fn oldest_pending(&self) -> MarqueeResult<Option<Timestamp>> {
            self.inner.oldest_pending().await
        }

        async fn dead_letters(&self) -> MarqueeResult<Vec<DeadLetter>> {
            self.inner.dead_letters().await
        }
    }

    // === Primary store ===

    /// Primary store wrapper that counts reads and can be switched offline.
    pub struct CountingStore {
        inner: Arc<dyn PrimaryStore>,
        content_reads: AtomicU64,
        list_reads: AtomicU64,
        media_reads: AtomicU64,
        writes: AtomicU64,
        offline: AtomicBool,
    }

    impl CountingStore {
        pub fn new(inner: Arc<dyn PrimaryStore>) -> Self {
            Self {
                inner,
                content_reads: AtomicU64::new(0),
                list_reads: AtomicU64::new(0),
                media_reads: AtomicU64::new(0),
                writes: AtomicU64::new(0),
                offline: AtomicBool::new(false),
            }
        }

        pub fn content_reads(&self) -> u64 {
            self.content_reads.load(Ordering::SeqCst)
        }

        pub fn list_reads(&self) -> u64 {
            self.list_reads.load(Ordering::SeqCst)
        }

        pub fn media_reads(&self) -> u64 {
            self.media_reads.load(Ordering::SeqCst)
        }

        pub fn writes(&self) -> u64 {
            self.writes.load(Ordering::SeqCst)
        }

        pub fn reset_counts(&self) {
            self.content_reads.store(0, Ordering::SeqCst);
            self.list_reads.store(0, Ordering::SeqCst);
            self.media_reads.store(0, Ordering::SeqCst);
            self.writes.store(0, Ordering::SeqCst);
        }

        /// While offline every operation fails with a connection error.
        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn check(&self, counter: &AtomicU64) -> MarqueeResult<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(StoreError::Connection {
                    reason: INJECTED.to_string(),
                }
                .into());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PrimaryStore for CountingStore {
        async fn content_insert(&self, content: &Content) -> MarqueeResult<ContentProjection> {
            self.check(&self.writes)?;
            self.inner.content_insert(content).await
        }

        async fn content_update(
            &self,
            id: ContentId,
            patch: &ContentPatch,
        ) -> MarqueeResult<ContentProjection> {
            self.check(&self.writes)?;
            self.inner.content_update(id, patch).await
        }

        async fn content_delete(&self, id: ContentId) -> MarqueeResult<()> {
            self.check(&self.writes)?;
            self.inner.content_delete(id).await
        }

        async fn content_get(&self, id: ContentId) -> MarqueeResult<Option<ContentProjection>> {
            self.check(&self.content_reads)?;
            self.inner.content_get(id).await
        }

        async fn content_list(&self, query: &ContentListQuery) -> MarqueeResult<ContentPage> {
            self.check(&self.list_reads)?;
            self.inner.content_list(query).await
        }

        async fn media_insert(&self, media: &Media) -> MarqueeResult<ContentProjection> {
            self.check(&self.writes)?;
            self.inner.media_insert(media).await
        }

        async fn media_update(
            &self,
            content_id: ContentId,
            patch: &MediaPatch,
        ) -> MarqueeResult<ContentProjection> {
            self.check(&self.writes)?;
            self.inner.media_update(content_id, patch).await
        }

        async fn media_delete(&self, content_id: ContentId) -> MarqueeResult<ContentProjection> {
            self.check(&self.writes)?;
            self.inner.media_delete(content_id).await
        }

        async fn media_get(&self, content_id: ContentId) -> MarqueeResult<Option<Media>> {
            self.check(&self.media_reads)?;
            self.inner.media_get(content_id).await
        }
    }

    /// Primary store whose next read, once armed, completes against the
    /// inner store and then parks until released. Lets a test commit a write
    /// between a read and the cache population that follows it.
    pub struct GatedStore {
        inner: Arc<dyn PrimaryStore>,
        armed: AtomicBool,
        read_done: Notify,
        release: Notify,
    }

    impl GatedStore {
        pub fn new(inner: Arc<dyn PrimaryStore>) -> Self {
            Self {
                inner,
                armed: AtomicBool::new(false),
                read_done: Notify::new(),
                release: Notify::new(),
            }
        }

        /// Park the next `content_get` or `content_list` after it reads.
        pub fn arm(&self) {
            self.armed.store(true, Ordering::SeqCst);
        }

        /// Resolves once the armed read has happened.
        pub async fn parked(&self) {
            self.read_done.notified().await;
        }

        pub fn release(&self) {
            self.release.notify_one();
        }

        async fn gate(&self) {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.read_done.notify_one();
                self.release.notified().await;
            }
        }
    }

    #[async_trait]
    impl PrimaryStore for GatedStore {
        async fn content_insert(&self, content: &Content) -> MarqueeResult<ContentProjection> {
            self.inner.content_insert(content).await
        }

        async fn content_update(
            &self,
            id: ContentId,
            patch: &ContentPatch,
        ) -> MarqueeResult<ContentProjection> {
            self.inner.content_update(id, patch).await
        }

        async fn content_delete(&self, id: ContentId) -> MarqueeResult<()> {
            self.inner.content_delete(id).await
        }

        async fn content_get(&self, id: ContentId) -> MarqueeResult<Option<ContentProjection>> {
            let read = self.inner.content_get(id).await;
            self.gate().await;
            read
        }

        async fn content_list(&self, query: &ContentListQuery) -> MarqueeResult<ContentPage> {
            let read = self.inner.content_list(query).await;
            self.gate().await;
            read
        }

        async fn media_insert(&self, media: &Media) -> MarqueeResult<ContentProjection> {
            self.inner.media_insert(media).await
        }

        async fn media_update(
            &self,
            content_id: ContentId,
            patch: &MediaPatch,
        ) -> MarqueeResult<ContentProjection> {
            self.inner.media_update(content_id, patch).await
        }

        async fn media_delete(&self, content_id: ContentId) -> MarqueeResult<ContentProjection> {
            self.inner.media_delete(content_id).await
        }

        async fn media_get(&self, content_id: ContentId) -> MarqueeResult<Option<Media>> {
            self.inner.media_get(content_id).await
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for valid mutation payloads.

    use chrono::NaiveDate;
    use marquee_core::{
        ContentDraft, ContentId, ContentPatch, EntityIdType, LifecycleState, MediaDraft,
        MediaProvider, MediaType,
    };
    use proptest::prelude::*;
    use uuid::Uuid;

    pub fn arb_content_id() -> impl Strategy<Value = ContentId> {
        any::<u128>().prop_map(|n| ContentId::new(Uuid::from_u128(n)))
    }

    /// A title that passes validation.
    pub fn arb_title() -> impl Strategy<Value = String> {
        "[A-Za-z0-9][A-Za-z0-9 :'-]{0,60}"
    }

    pub fn arb_language() -> impl Strategy<Value = String> {
        prop_oneof![Just("en"), Just("fr"), Just("de"), Just("pt-BR"), Just("es")]
            .prop_map(str::to_string)
    }

    pub fn arb_categories() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[A-Za-z][a-z]{0,11}", 0..4)
    }

    pub fn arb_lifecycle_state() -> impl Strategy<Value = LifecycleState> {
        prop_oneof![
            Just(LifecycleState::Draft),
            Just(LifecycleState::Published),
        ]
    }

    pub fn arb_media_type() -> impl Strategy<Value = MediaType> {
        prop_oneof![Just(MediaType::Audio), Just(MediaType::Video)]
    }

    pub fn arb_publication_date() -> impl Strategy<Value = NaiveDate> {
        (2000i32..2030, 1u32..=12, 1u32..=28)
            .prop_filter_map("valid date", |(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
    }

    /// A draft that passes validation, in either lifecycle state.
    pub fn arb_content_draft() -> impl Strategy<Value = ContentDraft> {
        (
            arb_title(),
            proptest::option::of("[a-z ]{0,80}"),
            arb_categories(),
            proptest::option::of(arb_language()),
            proptest::option::of(1u32..20_000),
            proptest::option::of(arb_publication_date()),
            arb_lifecycle_state(),
        )
            .prop_map(
                |(title, description, categories, language, duration_secs, publication_date, state)| {
                    ContentDraft {
                        title,
                        description,
                        categories,
                        language,
                        duration_secs,
                        publication_date,
                        state,
                    }
                },
            )
    }

    pub fn arb_published_draft() -> impl Strategy<Value = ContentDraft> {
        arb_content_draft().prop_map(ContentDraft::published)
    }

    /// A non-empty patch that passes validation.
    pub fn arb_content_patch() -> impl Strategy<Value = ContentPatch> {
        (
            proptest::option::of(arb_title()),
            proptest::option::of(arb_categories()),
            proptest::option::of(arb_language()),
            proptest::option::of(arb_lifecycle_state()),
        )
            .prop_map(|(title, categories, language, state)| ContentPatch {
                title,
                categories,
                language: language.map(Some),
                state,
                ..Default::default()
            })
            .prop_filter("patch must change something", |p| !p.is_empty())
    }

    /// Upload or external media that passes validation.
    pub fn arb_media_draft() -> impl Strategy<Value = MediaDraft> {
        let upload = (arb_media_type(), "[a-z0-9]{1,12}")
            .prop_map(|(t, name)| MediaDraft::upload(t, format!("/media/{}.bin", name)));
        let external = "[A-Za-z0-9_-]{11}".prop_map(|id| {
            MediaDraft::external(
                MediaType::Video,
                MediaProvider::Youtube,
                format!("https://www.youtube.com/watch?v={}", id),
            )
        });
        prop_oneof![upload, external]
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made payloads and configurations.

    use std::time::Duration;

    use chrono::{NaiveDate, Utc};
    use marquee_core::{
        Content, ContentDraft, ContentId, EntityIdType, MediaDraft, MediaProvider, MediaType,
        RetryConfig, SyncConfig,
    };

    /// A published episode with every optional field set.
    pub fn published_episode(title: &str) -> ContentDraft {
        ContentDraft::new(title)
            .with_description(format!("{} description", title))
            .with_categories(["News", "Weekly"])
            .with_language("en")
            .with_duration(1800)
            .with_publication_date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap_or_default())
            .published()
    }

    /// A draft with only a title.
    pub fn draft_episode(title: &str) -> ContentDraft {
        ContentDraft::new(title)
    }

    pub fn video_upload() -> MediaDraft {
        MediaDraft::upload(MediaType::Video, "/media/episode.mp4").with_duration(1800)
    }

    pub fn audio_upload() -> MediaDraft {
        MediaDraft::upload(MediaType::Audio, "/media/episode.mp3").with_duration(1800)
    }

    pub fn youtube_video() -> MediaDraft {
        MediaDraft::external(
            MediaType::Video,
            MediaProvider::Youtube,
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        )
    }

    /// A content entity as it would be inserted, before the store bumps its version.
    pub fn content(draft: ContentDraft) -> Content {
        draft.into_content(ContentId::now_v7(), Utc::now())
    }

    /// Engine configuration with zero backoff and a single partition, so tests
    /// never sleep and job order is total.
    pub fn fast_config() -> SyncConfig {
        SyncConfig::default()
            .with_enqueue_retry(RetryConfig::immediate(2))
            .with_index_retry(RetryConfig::immediate(3))
            .with_partitions(1)
            .with_lag_check_interval(Duration::from_millis(50))
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on MARQUEE error classes.

    use marquee_core::{ErrorClass, MarqueeResult};

    pub fn assert_class<T: std::fmt::Debug>(result: &MarqueeResult<T>, expected: ErrorClass) {
        match result {
            Err(e) => assert_eq!(e.class(), expected, "Wrong error class for {}", e),
            Ok(v) => panic!("Expected {:?} error, got Ok({:?})", expected, v),
        }
    }

    pub fn assert_not_found<T: std::fmt::Debug>(result: &MarqueeResult<T>) {
        assert_class(result, ErrorClass::NotFound);
    }

    pub fn assert_validation_error<T: std::fmt::Debug>(result: &MarqueeResult<T>) {
        assert_class(result, ErrorClass::Validation);
    }

    pub fn assert_conflict<T: std::fmt::Debug>(result: &MarqueeResult<T>) {
        assert_class(result, ErrorClass::Conflict);
    }
}

#[cfg(test)]
mod tests {
    use super::doubles::*;
    use super::*;
    use marquee_storage::{CacheGateway, CacheKey, PrimaryStore, SearchIndex, TaskQueue};
    use proptest::prelude::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_flaky_index_recovers_after_failures() {
        let index = FlakySearchIndex::new(Arc::new(InMemorySearchIndex::new()), Fault::Transient, 2);
        let id = ContentId::now_v7();

        assert!(index.delete(id).await.unwrap_err().is_retryable());
        assert!(index.delete(id).await.is_err());
        assert!(index.delete(id).await.is_ok());
        assert_eq!(index.write_attempts(), 3);
    }

    #[tokio::test]
    async fn test_permanent_index_fault_is_not_retryable() {
        let index = FlakySearchIndex::always(Arc::new(InMemorySearchIndex::new()), Fault::Permanent);
        let err = index.delete(ContentId::now_v7()).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::PermanentInfra);
    }

    #[tokio::test]
    async fn test_failing_cache_modes() {
        let key = CacheKey::content(ContentId::now_v7());

        let down = FailingCache::unavailable();
        assert!(down.get(&key).await.is_err());
        assert!(down.invalidate(&key).await.is_err());

        let garbage = FailingCache::garbage();
        assert!(garbage.get(&key).await.unwrap().is_some());
        assert!(garbage.invalidate(&key).await.is_ok());
        assert_eq!(garbage.invalidations(), 1);
    }

    #[tokio::test]
    async fn test_failing_queue_toggles() {
        let queue = FailingQueue::new(Arc::new(InMemoryTaskQueue::new(1)), Fault::Transient);
        let job = marquee_core::ReindexJob::upsert(ContentId::now_v7());

        assert!(queue.enqueue(job.clone()).await.unwrap_err().is_retryable());
        queue.set_failing(false);
        queue.enqueue(job).await.unwrap();
        assert_eq!(queue.pending().await.unwrap(), 1);
        assert_eq!(queue.enqueue_attempts(), 2);
    }

    #[tokio::test]
    async fn test_counting_store_counts_and_goes_offline() {
        let store = CountingStore::new(Arc::new(InMemoryPrimaryStore::new()));
        let content = fixtures::content(fixtures::published_episode("Ep1"));
        store.content_insert(&content).await.unwrap();
        store.content_get(content.content_id).await.unwrap();

        assert_eq!(store.writes(), 1);
        assert_eq!(store.content_reads(), 1);

        store.set_offline(true);
        let result = store.content_get(content.content_id).await;
        assertions::assert_class(&result, ErrorClass::TransientInfra);
    }

    #[tokio::test]
    async fn test_gated_store_parks_armed_read() {
        let store = Arc::new(GatedStore::new(Arc::new(InMemoryPrimaryStore::new())));
        let content = fixtures::content(fixtures::published_episode("Ep1"));
        let id = content.content_id;
        store.content_insert(&content).await.unwrap();

        store.arm();
        let reader = store.clone();
        let read = tokio::spawn(async move { reader.content_get(id).await });
        store.parked().await;
        assert!(!read.is_finished());
        store.release();
        assert!(read.await.unwrap().unwrap().is_some());

        // One read per arming.
        assert!(store.content_get(id).await.unwrap().is_some());
    }

    #[test]
    fn test_fixtures_are_valid() {
        assert!(fixtures::published_episode("Ep1").validate().is_ok());
        assert!(fixtures::draft_episode("Ep2").validate().is_ok());
        assert!(fixtures::video_upload().validate().is_ok());
        assert!(fixtures::youtube_video().validate().is_ok());
        assert!(fixtures::fast_config().validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_generated_drafts_validate(draft in generators::arb_content_draft()) {
            prop_assert!(draft.validate().is_ok());
        }

        #[test]
        fn prop_generated_patches_validate(patch in generators::arb_content_patch()) {
            prop_assert!(patch.validate().is_ok());
        }

        #[test]
        fn prop_generated_media_validates(draft in generators::arb_media_draft()) {
            prop_assert!(draft.validate().is_ok());
        }
    }
}
