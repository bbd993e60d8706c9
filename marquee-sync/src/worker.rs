//! Reindex worker and its per-partition pool.
//!
//! Per job:
//!
//! ```text
//! upsert: read primary store -> published: index upsert
//!                            -> draft:     index delete
//!                            -> missing:   index delete
//! delete: index delete
//! then ack
//! ```
//!
//! Transient failures are retried in-process with exponential backoff.
//! Exhausted or permanent failures go to the dead-letter path. A shutdown
//! during backoff returns the job to the head of its partition.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use marquee_core::{
    IndexDocument, JobOperation, MarqueeResult, ReindexJob, RetryConfig, SyncConfig,
};
use marquee_storage::{consume, Delivery, PrimaryStore, SearchIndex, TaskQueue};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::metrics::SyncMetrics;

/// What the worker did with a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Document written to the index.
    Indexed,
    /// Document removed (delete job, draft content, or content gone).
    Removed,
    DeadLettered,
    /// Shutdown interrupted a retry; the job was returned to the queue.
    Requeued,
}

/// Applies reindex jobs to the search index.
pub struct ReindexWorker {
    store: Arc<dyn PrimaryStore>,
    index: Arc<dyn SearchIndex>,
    queue: Arc<dyn TaskQueue>,
    retry: RetryConfig,
    metrics: Arc<SyncMetrics>,
}

impl ReindexWorker {
    pub fn new(
        store: Arc<dyn PrimaryStore>,
        index: Arc<dyn SearchIndex>,
        queue: Arc<dyn TaskQueue>,
        retry: RetryConfig,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            store,
            index,
            queue,
            retry,
            metrics,
        }
    }

    /// One attempt at a job. Idempotent.
    pub async fn apply(&self, job: &ReindexJob) -> MarqueeResult<JobOutcome> {
        let id = job.content_id;
        match job.operation {
            JobOperation::Upsert => match self.store.content_get(id).await? {
                Some(projection) if projection.is_published() => {
                    self.index
                        .upsert(&IndexDocument::from_projection(&projection))
                        .await?;
                    Ok(JobOutcome::Indexed)
                }
                Some(_) => {
                    self.index.delete(id).await?;
                    Ok(JobOutcome::Removed)
                }
                None => {
                    tracing::debug!(content_id = %id, "Content gone before upsert ran, deleting document");
                    self.index.delete(id).await?;
                    Ok(JobOutcome::Removed)
                }
            },
            JobOperation::Delete => {
                self.index.delete(id).await?;
                Ok(JobOutcome::Removed)
            }
        }
    }

    /// Process a delivery to completion: ack, dead-letter, or (on shutdown
    /// during backoff) nack.
    pub async fn process(
        &self,
        delivery: Delivery,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> MarqueeResult<JobOutcome> {
        let job = delivery.job.clone();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let error = match self.apply(&job).await {
                Ok(outcome) => {
                    self.queue.ack(&delivery).await?;
                    SyncMetrics::incr(&self.metrics.jobs_processed);
                    tracing::debug!(
                        content_id = %job.content_id,
                        operation = %job.operation,
                        outcome = ?outcome,
                        "Reindex job applied"
                    );
                    return Ok(outcome);
                }
                Err(e) => e,
            };

            if !error.is_retryable() || attempt > self.retry.max_retries {
                return self.dead_letter(delivery, &error, attempt).await;
            }

            let delay = self.retry.delay_for_attempt(attempt);
            SyncMetrics::incr(&self.metrics.index_retries);
            tracing::warn!(
                content_id = %job.content_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Reindex attempt failed, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::info!(content_id = %job.content_id, "Shutdown during backoff, requeueing job");
                        self.queue.nack(delivery).await?;
                        return Ok(JobOutcome::Requeued);
                    }
                }
            }
        }
    }

    async fn dead_letter(
        &self,
        delivery: Delivery,
        error: &marquee_core::MarqueeError,
        attempts: u32,
    ) -> MarqueeResult<JobOutcome> {
        let job = delivery.job.clone();
        let reason = format!("{} (after {} attempts)", error, attempts);
        self.queue.dead_letter(delivery, reason, attempts).await?;
        SyncMetrics::incr(&self.metrics.dead_letters);
        tracing::error!(
            job_id = %job.job_id,
            content_id = %job.content_id,
            operation = %job.operation,
            attempts,
            error = %error,
            "Reindex job dead-lettered, manual intervention required"
        );
        Ok(JobOutcome::DeadLettered)
    }

    /// Consume one partition until shutdown or until the queue closes.
    pub async fn run(self: Arc<Self>, partition: usize, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!(partition, "Reindex consumer started");
        let mut deliveries = Box::pin(consume(self.queue.clone(), partition));

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => {
                        if let Err(e) = self.process(delivery, &mut shutdown_rx).await {
                            tracing::error!(partition, error = %e, "Failed to settle reindex delivery");
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!(partition, error = %e, "Task queue receive failed, stopping consumer");
                        break;
                    }
                    None => {
                        tracing::info!(partition, "Task queue closed and drained");
                        break;
                    }
                }
            }
        }

        tracing::info!(partition, "Reindex consumer stopped");
    }
}

// ============================================================================
// POOL
// ============================================================================

/// Handle to a running worker pool.
pub struct ReindexPoolHandle {
    consumers: Vec<JoinHandle<()>>,
    lag_monitor: JoinHandle<()>,
}

impl ReindexPoolHandle {
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Wait for every consumer and the lag monitor to stop.
    pub async fn join(self) {
        for consumer in self.consumers {
            if let Err(e) = consumer.await {
                tracing::error!(error = %e, "Reindex consumer panicked");
            }
        }
        if let Err(e) = self.lag_monitor.await {
            tracing::error!(error = %e, "Index lag monitor panicked");
        }
    }
}

/// Exactly one consumer per queue partition, plus an index lag monitor.
pub struct ReindexWorkerPool {
    worker: Arc<ReindexWorker>,
    config: SyncConfig,
}

impl ReindexWorkerPool {
    pub fn new(worker: Arc<ReindexWorker>, config: SyncConfig) -> Self {
        Self { worker, config }
    }

    /// Spawn the consumers. They run until `shutdown_rx` flips to `true`.
    pub fn start(self, shutdown_rx: watch::Receiver<bool>) -> ReindexPoolHandle {
        let partitions = self.worker.queue.partitions();
        let consumers = (0..partitions)
            .map(|partition| {
                let worker = self.worker.clone();
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move { worker.run(partition, shutdown_rx).await })
            })
            .collect();

        let lag_monitor = tokio::spawn(index_lag_monitor(
            self.worker.queue.clone(),
            self.config,
            self.worker.metrics.clone(),
            shutdown_rx,
        ));

        tracing::info!(partitions, "Reindex worker pool started");
        ReindexPoolHandle {
            consumers,
            lag_monitor,
        }
    }
}

/// Periodically compare the oldest pending job against `max_index_lag`.
async fn index_lag_monitor(
    queue: Arc<dyn TaskQueue>,
    config: SyncConfig,
    metrics: Arc<SyncMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut check_interval = interval(config.lag_check_interval);
    check_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = check_interval.tick() => {
                check_index_lag(queue.as_ref(), &config, &metrics).await;
            }
        }
    }
}

/// Age of the oldest pending job, when it is past `max_index_lag`.
///
/// Records nothing; `SyncEngine::health` calls it on every poll.
pub(crate) async fn index_lag_exceeded(
    queue: &dyn TaskQueue,
    config: &SyncConfig,
) -> MarqueeResult<Option<Duration>> {
    let Some(oldest) = queue.oldest_pending().await? else {
        return Ok(None);
    };
    let lag = (Utc::now() - oldest).to_std().unwrap_or_default();
    Ok((lag > config.max_index_lag).then_some(lag))
}

/// Monitor tick: warn and count when the lag bound is exceeded.
pub(crate) async fn check_index_lag(
    queue: &dyn TaskQueue,
    config: &SyncConfig,
    metrics: &SyncMetrics,
) -> bool {
    match index_lag_exceeded(queue, config).await {
        Ok(Some(lag)) => {
            SyncMetrics::incr(&metrics.lag_warnings);
            tracing::warn!(
                lag_ms = lag.as_millis() as u64,
                max_lag_ms = config.max_index_lag.as_millis() as u64,
                "Search index lag exceeds bound"
            );
            true
        }
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(error = %e, "Index lag check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::{ContentId, EntityIdType};
    use marquee_storage::InMemoryTaskQueue;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_empty_queue_has_no_lag() {
        let queue = InMemoryTaskQueue::new(1);
        let metrics = SyncMetrics::new();
        assert!(!check_index_lag(&queue, &SyncConfig::default(), &metrics).await);
        assert_eq!(metrics.lag_warnings.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_old_pending_job_exceeds_bound() {
        let queue = InMemoryTaskQueue::new(1);
        let mut job = ReindexJob::upsert(ContentId::now_v7());
        job.enqueued_at = Utc::now() - chrono::Duration::minutes(2);
        queue.enqueue(job).await.unwrap();

        let metrics = SyncMetrics::new();
        assert!(check_index_lag(&queue, &SyncConfig::default(), &metrics).await);
        assert_eq!(metrics.lag_warnings.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_lag_query_records_nothing() {
        let queue = InMemoryTaskQueue::new(1);
        let mut job = ReindexJob::upsert(ContentId::now_v7());
        job.enqueued_at = Utc::now() - chrono::Duration::minutes(2);
        queue.enqueue(job).await.unwrap();

        let lag = index_lag_exceeded(&queue, &SyncConfig::default()).await.unwrap();
        assert!(lag.is_some_and(|l| l >= Duration::from_secs(119)));
        let within = SyncConfig::default().with_max_index_lag(Duration::from_secs(600));
        assert_eq!(index_lag_exceeded(&queue, &within).await.unwrap(), None);
    }
}
