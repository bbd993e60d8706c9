//! In-memory partitioned task queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use marquee_core::{DeadLetter, MarqueeResult, QueueError, ReindexJob, Timestamp};
use tokio::sync::{Mutex, Notify};

use crate::queue::{partition_for, Delivery, TaskQueue};

#[derive(Debug)]
struct QueuedJob {
    job: ReindexJob,
    attempts: u32,
}

#[derive(Debug, Default)]
struct PartitionState {
    queued: VecDeque<QueuedJob>,
    /// At most one delivery per partition is outstanding.
    in_flight: Option<QueuedJob>,
}

impl PartitionState {
    fn take_in_flight(&mut self, delivery: &Delivery) -> Option<QueuedJob> {
        match &self.in_flight {
            Some(q) if q.job.job_id == delivery.job.job_id => self.in_flight.take(),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Partition {
    state: Mutex<PartitionState>,
    notify: Notify,
}

/// Queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub acked: u64,
    pub redelivered: u64,
    pub dead_lettered: u64,
}

/// Task queue held in process memory.
///
/// Jobs are routed to a partition by content identifier. A partition releases
/// its next job only after the outstanding delivery is acked, nacked or
/// dead-lettered, which keeps per-identifier order under redelivery.
#[derive(Debug)]
pub struct InMemoryTaskQueue {
    partitions: Vec<Partition>,
    closed: AtomicBool,
    dead_letters: Mutex<Vec<DeadLetter>>,
    enqueued: AtomicU64,
    acked: AtomicU64,
    redelivered: AtomicU64,
    dead_lettered: AtomicU64,
}

impl InMemoryTaskQueue {
    /// Create a queue with `partitions` partitions (at least one).
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: (0..partitions.max(1)).map(|_| Partition::default()).collect(),
            closed: AtomicBool::new(false),
            dead_letters: Mutex::new(Vec::new()),
            enqueued: AtomicU64::new(0),
            acked: AtomicU64::new(0),
            redelivered: AtomicU64::new(0),
            dead_lettered: AtomicU64::new(0),
        }
    }

    /// Stop accepting jobs. Consumers drain what is queued, then see `None`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for partition in &self.partitions {
            partition.notify.notify_waiters();
            partition.notify.notify_one();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            redelivered: self.redelivered.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }

    /// Jobs queued on one partition, in delivery order, excluding the one in flight.
    pub async fn queued_jobs(&self, partition: usize) -> MarqueeResult<Vec<ReindexJob>> {
        let part = self.partition(partition)?;
        let state = part.state.lock().await;
        Ok(state.queued.iter().map(|q| q.job.clone()).collect())
    }

    fn partition(&self, partition: usize) -> MarqueeResult<&Partition> {
        self.partitions.get(partition).ok_or_else(|| {
            QueueError::UnknownPartition {
                partition,
                partitions: self.partitions.len(),
            }
            .into()
        })
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    fn partitions(&self) -> usize {
        self.partitions.len()
    }

    async fn enqueue(&self, job: ReindexJob) -> MarqueeResult<()> {
        if self.is_closed() {
            return Err(QueueError::Closed.into());
        }
        let part = self.partition(partition_for(job.content_id, self.partitions.len()))?;
        part.state
            .lock()
            .await
            .queued
            .push_back(QueuedJob { job, attempts: 0 });
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        part.notify.notify_one();
        Ok(())
    }

    async fn receive(&self, partition: usize) -> MarqueeResult<Option<Delivery>> {
        let part = self.partition(partition)?;
        loop {
            {
                let mut state = part.state.lock().await;
                if state.in_flight.is_none() {
                    if let Some(mut next) = state.queued.pop_front() {
                        next.attempts += 1;
                        let delivery = Delivery {
                            job: next.job.clone(),
                            partition,
                            attempt: next.attempts,
                        };
                        state.in_flight = Some(next);
                        return Ok(Some(delivery));
                    }
                    if self.is_closed() {
                        return Ok(None);
                    }
                }
            }
            part.notify.notified().await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> MarqueeResult<()> {
        let part = self.partition(delivery.partition)?;
        if part.state.lock().await.take_in_flight(delivery).is_some() {
            self.acked.fetch_add(1, Ordering::Relaxed);
            part.notify.notify_one();
        }
        Ok(())
    }

    async fn nack(&self, delivery: Delivery) -> MarqueeResult<()> {
        let part = self.partition(delivery.partition)?;
        let mut state = part.state.lock().await;
        if let Some(job) = state.take_in_flight(&delivery) {
            state.queued.push_front(job);
            self.redelivered.fetch_add(1, Ordering::Relaxed);
            part.notify.notify_one();
        }
        Ok(())
    }

    async fn dead_letter(
        &self,
        delivery: Delivery,
        reason: String,
        attempts: u32,
    ) -> MarqueeResult<()> {
        let part = self.partition(delivery.partition)?;
        let taken = part.state.lock().await.take_in_flight(&delivery);
        if let Some(queued) = taken {
            self.dead_letters.lock().await.push(DeadLetter {
                job: queued.job,
                reason,
                attempts,
                dead_lettered_at: Utc::now(),
            });
            self.dead_lettered.fetch_add(1, Ordering::Relaxed);
            part.notify.notify_one();
        }
        Ok(())
    }

    async fn pending(&self) -> MarqueeResult<usize> {
        let mut total = 0;
        for part in &self.partitions {
            let state = part.state.lock().await;
            total += state.queued.len() + usize::from(state.in_flight.is_some());
        }
        Ok(total)
    }

    async fn oldest_pending(&self) -> MarqueeResult<Option<Timestamp>> {
        let mut oldest: Option<Timestamp> = None;
        for part in &self.partitions {
            let state = part.state.lock().await;
            let partition_oldest = state
                .in_flight
                .iter()
                .chain(state.queued.iter())
                .map(|q| q.job.enqueued_at)
                .min();
            oldest = match (oldest, partition_oldest) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        Ok(oldest)
    }

    async fn dead_letters(&self) -> MarqueeResult<Vec<DeadLetter>> {
        Ok(self.dead_letters.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::{ContentId, EntityIdType};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_per_identifier() {
        let queue = InMemoryTaskQueue::new(4);
        let id = ContentId::now_v7();
        let partition = partition_for(id, 4);

        queue.enqueue(ReindexJob::upsert(id)).await.unwrap();
        queue.enqueue(ReindexJob::delete(id)).await.unwrap();

        let first = queue.receive(partition).await.unwrap().unwrap();
        assert_eq!(first.job.operation, marquee_core::JobOperation::Upsert);
        queue.ack(&first).await.unwrap();
        let second = queue.receive(partition).await.unwrap().unwrap();
        assert_eq!(second.job.operation, marquee_core::JobOperation::Delete);
        queue.ack(&second).await.unwrap();

        assert_eq!(queue.pending().await.unwrap(), 0);
        assert_eq!(queue.stats().acked, 2);
    }

    #[tokio::test]
    async fn test_nack_redelivers_at_head() {
        let queue = InMemoryTaskQueue::new(1);
        let id = ContentId::now_v7();
        queue.enqueue(ReindexJob::upsert(id)).await.unwrap();
        queue.enqueue(ReindexJob::delete(id)).await.unwrap();

        let first = queue.receive(0).await.unwrap().unwrap();
        let job_id = first.job.job_id;
        queue.nack(first).await.unwrap();

        let again = queue.receive(0).await.unwrap().unwrap();
        assert_eq!(again.job.job_id, job_id);
        assert_eq!(again.attempt, 2);
        assert_eq!(queue.stats().redelivered, 1);
    }

    #[tokio::test]
    async fn test_outstanding_delivery_blocks_partition() {
        let queue = Arc::new(InMemoryTaskQueue::new(1));
        let id = ContentId::now_v7();
        queue.enqueue(ReindexJob::upsert(id)).await.unwrap();
        queue.enqueue(ReindexJob::upsert(id)).await.unwrap();

        let first = queue.receive(0).await.unwrap().unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), queue.receive(0)).await;
        assert!(blocked.is_err());

        queue.ack(&first).await.unwrap();
        assert!(queue.receive(0).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dead_letter_records_reason() {
        let queue = InMemoryTaskQueue::new(2);
        let id = ContentId::now_v7();
        queue.enqueue(ReindexJob::upsert(id)).await.unwrap();

        let delivery = queue
            .receive(partition_for(id, 2))
            .await
            .unwrap()
            .unwrap();
        queue
            .dead_letter(delivery, "schema mismatch".to_string(), 4)
            .await
            .unwrap();

        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].job.content_id, id);
        assert_eq!(dead[0].attempts, 4);
        assert_eq!(dead[0].reason, "schema mismatch");
        assert_eq!(queue.pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = InMemoryTaskQueue::new(1);
        let id = ContentId::now_v7();
        queue.enqueue(ReindexJob::upsert(id)).await.unwrap();
        queue.close();

        assert!(matches!(
            queue.enqueue(ReindexJob::upsert(id)).await,
            Err(marquee_core::MarqueeError::Queue(QueueError::Closed))
        ));
        let delivery = queue.receive(0).await.unwrap().unwrap();
        queue.ack(&delivery).await.unwrap();
        assert!(queue.receive(0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_wakes_idle_consumer() {
        let queue = Arc::new(InMemoryTaskQueue::new(1));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.receive(0).await })
        };
        tokio::task::yield_now().await;
        queue.close();
        let received = consumer.await.unwrap().unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn test_oldest_pending() {
        let queue = InMemoryTaskQueue::new(4);
        assert!(queue.oldest_pending().await.unwrap().is_none());

        let first = ReindexJob::upsert(ContentId::now_v7());
        let enqueued_at = first.enqueued_at;
        queue.enqueue(first).await.unwrap();
        queue.enqueue(ReindexJob::upsert(ContentId::now_v7())).await.unwrap();

        assert_eq!(queue.oldest_pending().await.unwrap(), Some(enqueued_at));
    }

    #[tokio::test]
    async fn test_unknown_partition() {
        let queue = InMemoryTaskQueue::new(2);
        assert!(matches!(
            queue.receive(5).await,
            Err(marquee_core::MarqueeError::Queue(QueueError::UnknownPartition { .. }))
        ));
    }
}
