//! Task queue gateway for reindex jobs.
//!
//! Delivery is at-least-once. Jobs for one content identifier always land in
//! the same partition, and each partition hands out one delivery at a time, so
//! a single consumer per partition sees a given identifier's jobs in enqueue
//! order.

use std::sync::Arc;

use ::async_trait::async_trait;
use futures_util::stream::{self, Stream};
use marquee_core::{
    ContentId, DeadLetter, EntityIdType, MarqueeResult, ReindexJob, Timestamp,
};

/// A job handed to a consumer, awaiting ack, nack or dead-letter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub job: ReindexJob,
    pub partition: usize,
    /// 1 on first delivery, incremented on every redelivery.
    pub attempt: u32,
}

/// Stable partition for a content identifier.
pub fn partition_for(id: ContentId, partitions: usize) -> usize {
    if partitions == 0 {
        return 0;
    }
    (id.as_uuid().as_u128() % partitions as u128) as usize
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Number of partitions. Consumers are expected one per partition.
    fn partitions(&self) -> usize;

    async fn enqueue(&self, job: ReindexJob) -> MarqueeResult<()>;

    /// Wait for the next delivery on a partition. Returns `None` once the
    /// queue is closed and the partition is drained.
    async fn receive(&self, partition: usize) -> MarqueeResult<Option<Delivery>>;

    /// Confirm the delivery was processed.
    async fn ack(&self, delivery: &Delivery) -> MarqueeResult<()>;

    /// Return the delivery to the head of its partition for redelivery.
    async fn nack(&self, delivery: Delivery) -> MarqueeResult<()>;

    /// Park the delivery for manual intervention. `attempts` is how many
    /// times the consumer tried the job before giving up.
    async fn dead_letter(
        &self,
        delivery: Delivery,
        reason: String,
        attempts: u32,
    ) -> MarqueeResult<()>;

    /// Jobs enqueued or in flight, not yet acked or dead-lettered.
    async fn pending(&self) -> MarqueeResult<usize>;

    /// Enqueue time of the oldest pending job.
    async fn oldest_pending(&self) -> MarqueeResult<Option<Timestamp>>;

    async fn dead_letters(&self) -> MarqueeResult<Vec<DeadLetter>>;
}

/// Consume a partition as a stream of deliveries.
///
/// The stream ends when the queue is closed and drained, or after yielding the
/// first receive error.
pub fn consume(
    queue: Arc<dyn TaskQueue>,
    partition: usize,
) -> impl Stream<Item = MarqueeResult<Delivery>> + Send {
    stream::unfold(Some(queue), move |state| async move {
        let queue = state?;
        match queue.receive(partition).await {
            Ok(Some(delivery)) => Some((Ok(delivery), Some(queue))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_partition_is_stable_and_bounded() {
        let id = ContentId::now_v7();
        let first = partition_for(id, 8);
        assert_eq!(first, partition_for(id, 8));
        assert!(first < 8);
        assert_eq!(partition_for(id, 1), 0);
        assert_eq!(partition_for(id, 0), 0);
    }

    #[test]
    fn test_partition_uses_full_identifier() {
        let low = ContentId::new(Uuid::from_u128(5));
        let high = ContentId::new(Uuid::from_u128(6));
        assert_eq!(partition_for(low, 4), 1);
        assert_eq!(partition_for(high, 4), 2);
    }
}
