//! Degraded mode: enqueue outages, index lag and engine health.

use std::sync::Arc;
use std::time::Duration;

use marquee_core::{overall_status, HealthCheck, HealthStatus};
use marquee_storage::TaskQueue;
use marquee_test_utils::doubles::{Fault, FailingQueue};
use marquee_test_utils::{fixtures, InMemoryTaskQueue};

#[path = "support/harness.rs"]
mod harness;
use harness::Harness;

fn check<'a>(checks: &'a [HealthCheck], component: &str) -> &'a HealthCheck {
    checks
        .iter()
        .find(|c| c.component == component)
        .unwrap_or_else(|| panic!("missing {} health check", component))
}

fn failing_queue_harness(fault: Fault) -> (Harness, Arc<FailingQueue>) {
    let config = fixtures::fast_config();
    let inner: Arc<dyn TaskQueue> = Arc::new(InMemoryTaskQueue::new(config.partitions));
    let failing = Arc::new(FailingQueue::new(inner, fault));
    let port = failing.clone();
    let h = Harness::build(config, move |ports| ports.queue = port);
    (h, failing)
}

#[tokio::test]
async fn test_healthy_engine_reports_healthy() {
    let h = Harness::new();
    let checks = h.engine.health().await;

    assert_eq!(checks.len(), 4);
    assert_eq!(overall_status(&checks), HealthStatus::Healthy);
    let queue = check(&checks, "task_queue");
    assert_eq!(queue.metadata.as_ref().unwrap()["pending"], serde_json::json!(0));
}

#[tokio::test]
async fn test_enqueue_outage_degrades_but_write_succeeds() {
    let (h, queue) = failing_queue_harness(Fault::Transient);

    let created = h
        .engine
        .coordinator()
        .create_content(fixtures::published_episode("Ep1"))
        .await
        .unwrap();
    assert_eq!(created.content.version, 1);

    // One attempt plus two retries.
    assert_eq!(queue.enqueue_attempts(), 3);
    let snapshot = h.engine.metrics().snapshot();
    assert_eq!(snapshot.enqueue_failures, 1);
    assert_eq!(snapshot.enqueue_retries, 2);
    assert!(h.engine.metrics().is_queue_degraded());

    let checks = h.engine.health().await;
    assert_eq!(check(&checks, "task_queue").status, HealthStatus::Degraded);
    assert_eq!(overall_status(&checks), HealthStatus::Degraded);

    // The committed write is readable regardless.
    assert_eq!(h.engine.hydrator().get(created.content_id()).await.unwrap(), created);
}

#[tokio::test]
async fn test_next_successful_enqueue_clears_degraded_mode() {
    let (h, queue) = failing_queue_harness(Fault::Transient);
    let coordinator = h.engine.coordinator();

    coordinator
        .create_content(fixtures::published_episode("Ep1"))
        .await
        .unwrap();
    assert!(h.engine.metrics().is_queue_degraded());

    queue.set_failing(false);
    coordinator
        .create_content(fixtures::published_episode("Ep2"))
        .await
        .unwrap();

    assert!(!h.engine.metrics().is_queue_degraded());
    assert_eq!(queue.pending().await.unwrap(), 1);
    let checks = h.engine.health().await;
    assert_eq!(check(&checks, "task_queue").status, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_closed_queue_is_not_retried() {
    let (h, queue) = failing_queue_harness(Fault::Permanent);

    h.engine
        .coordinator()
        .create_content(fixtures::published_episode("Ep1"))
        .await
        .unwrap();

    assert_eq!(queue.enqueue_attempts(), 1);
    assert_eq!(h.engine.metrics().snapshot().enqueue_failures, 1);
    assert!(h.engine.metrics().is_queue_degraded());
}

#[tokio::test]
async fn test_index_lag_past_bound_degrades_task_queue() {
    let config = fixtures::fast_config().with_max_index_lag(Duration::from_millis(20));
    let h = Harness::build(config, |_| {});

    h.engine
        .coordinator()
        .create_content(fixtures::published_episode("Ep1"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let checks = h.engine.health().await;
    let queue = check(&checks, "task_queue");
    assert_eq!(queue.status, HealthStatus::Degraded);
    assert!(queue.message.as_deref().unwrap().contains("lag"));
}

#[tokio::test]
async fn test_health_polling_leaves_lag_warnings_alone() {
    let config = fixtures::fast_config().with_max_index_lag(Duration::from_millis(20));
    let h = Harness::build(config, |_| {});

    h.engine
        .coordinator()
        .create_content(fixtures::published_episode("Ep1"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    for _ in 0..3 {
        let checks = h.engine.health().await;
        assert_eq!(check(&checks, "task_queue").status, HealthStatus::Degraded);
    }
    assert_eq!(h.engine.metrics().snapshot().lag_warnings, 0);
}

#[tokio::test]
async fn test_store_outage_is_unhealthy() {
    let h = Harness::new();
    h.store.set_offline(true);

    let checks = h.engine.health().await;
    assert_eq!(check(&checks, "primary_store").status, HealthStatus::Unhealthy);
    assert_eq!(overall_status(&checks), HealthStatus::Unhealthy);
}
