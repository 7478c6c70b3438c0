//! Claim-intent broker trait.
//!
//! The broker decouples admission (fast, synchronous) from fulfillment
//! (durable, asynchronous). Delivery is at-least-once: consumers must
//! persist idempotently. Payloads are opaque JSON strings; partitioning by
//! key preserves per-resource ordering.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::result::AppResult;

/// One consumed message, held in-flight until acked, requeued, or
/// dead-lettered.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Partition the message was consumed from.
    pub partition: u32,
    /// Opaque message payload.
    pub payload: String,
    /// Number of failed delivery attempts recorded before this one.
    pub attempts: u32,
}

/// Trait for partitioned, key-ordered intent transport
/// (Redis lists or in-memory queues).
#[async_trait]
pub trait IntentBroker: Send + Sync + std::fmt::Debug + 'static {
    /// Number of partitions.
    fn partitions(&self) -> u32;

    /// The partition a key maps to. Stable across processes.
    fn partition_for(&self, key: Uuid) -> u32 {
        (key.as_u128() % self.partitions() as u128) as u32
    }

    /// Publish a payload to the partition owning `key`.
    async fn publish(&self, key: Uuid, payload: &str) -> AppResult<()>;

    /// Take the oldest message from a partition, waiting up to `wait`.
    /// The message stays in-flight until `ack`, `requeue`, or
    /// `dead_letter` is called for it.
    async fn consume(&self, partition: u32, wait: Duration) -> AppResult<Option<Delivery>>;

    /// Acknowledge a delivery, removing it permanently.
    async fn ack(&self, delivery: &Delivery) -> AppResult<()>;

    /// Return a failed delivery to the front of its partition so it is
    /// retried next, preserving per-key order. Returns the total failed
    /// attempts now recorded for the message.
    async fn requeue(&self, delivery: &Delivery) -> AppResult<u32>;

    /// Route a poison delivery to the dead-letter list so the partition
    /// keeps draining.
    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> AppResult<()>;

    /// Move messages that were in-flight when a consumer died back to
    /// their partitions. Called once on startup. Returns how many messages
    /// were recovered.
    async fn recover(&self) -> AppResult<u64>;

    /// Number of messages waiting in a partition.
    async fn pending_len(&self, partition: u32) -> AppResult<u64>;

    /// Number of dead-lettered messages.
    async fn dead_letter_len(&self) -> AppResult<u64>;

    /// Check that the broker backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
