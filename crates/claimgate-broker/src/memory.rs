//! In-memory intent broker for single-node deployments and tests.
//!
//! Mirrors the Redis backend observably: per-partition FIFO queues, an
//! in-flight set per partition, payload-keyed attempt counts, and a
//! dead-letter list.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use claimgate_core::error::AppError;
use claimgate_core::result::AppResult;
use claimgate_core::traits::broker::{Delivery, IntentBroker};

/// Interval between queue polls while a consumer waits for work.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
struct Partition {
    pending: VecDeque<String>,
    in_flight: Vec<String>,
}

#[derive(Debug)]
struct Queues {
    partitions: Vec<Partition>,
    attempts: HashMap<String, u32>,
    dead: Vec<String>,
}

/// In-memory broker backend.
#[derive(Debug)]
pub struct MemoryBroker {
    partitions: u32,
    state: Mutex<Queues>,
}

impl MemoryBroker {
    /// Create a new in-memory broker with the given partition count.
    pub fn new(partitions: u32) -> Self {
        Self {
            partitions,
            state: Mutex::new(Queues {
                partitions: (0..partitions).map(|_| Partition::default()).collect(),
                attempts: HashMap::new(),
                dead: Vec::new(),
            }),
        }
    }
}

fn partition_mut(partitions: &mut [Partition], partition: u32) -> AppResult<&mut Partition> {
    partitions
        .get_mut(partition as usize)
        .ok_or_else(|| AppError::broker(format!("Unknown partition: {partition}")))
}

fn remove_in_flight(queue: &mut Partition, payload: &str) {
    if let Some(pos) = queue.in_flight.iter().position(|p| p == payload) {
        queue.in_flight.remove(pos);
    }
}

#[async_trait]
impl IntentBroker for MemoryBroker {
    fn partitions(&self) -> u32 {
        self.partitions
    }

    async fn publish(&self, key: uuid::Uuid, payload: &str) -> AppResult<()> {
        let partition = self.partition_for(key);
        let mut guard = self.state.lock().await;
        partition_mut(&mut guard.partitions, partition)?
            .pending
            .push_back(payload.to_string());
        Ok(())
    }

    async fn consume(&self, partition: u32, wait: Duration) -> AppResult<Option<Delivery>> {
        let deadline = Instant::now() + wait;
        loop {
            {
                let mut guard = self.state.lock().await;
                let state = &mut *guard;
                let queue = partition_mut(&mut state.partitions, partition)?;
                if let Some(payload) = queue.pending.pop_front() {
                    queue.in_flight.push(payload.clone());
                    let attempts = state.attempts.get(&payload).copied().unwrap_or(0);
                    return Ok(Some(Delivery {
                        partition,
                        payload,
                        attempts,
                    }));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> AppResult<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let queue = partition_mut(&mut state.partitions, delivery.partition)?;
        remove_in_flight(queue, &delivery.payload);
        state.attempts.remove(&delivery.payload);
        Ok(())
    }

    async fn requeue(&self, delivery: &Delivery) -> AppResult<u32> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let queue = partition_mut(&mut state.partitions, delivery.partition)?;
        remove_in_flight(queue, &delivery.payload);
        // The retry goes to the consuming end so per-key order holds.
        queue.pending.push_front(delivery.payload.clone());
        let attempts = state.attempts.entry(delivery.payload.clone()).or_insert(0);
        *attempts += 1;
        Ok(*attempts)
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> AppResult<()> {
        warn!(
            partition = delivery.partition,
            attempts = delivery.attempts,
            reason,
            "Dead-lettering claim intent"
        );
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let queue = partition_mut(&mut state.partitions, delivery.partition)?;
        remove_in_flight(queue, &delivery.payload);
        state.dead.push(delivery.payload.clone());
        state.attempts.remove(&delivery.payload);
        Ok(())
    }

    async fn recover(&self) -> AppResult<u64> {
        let mut guard = self.state.lock().await;
        let mut recovered = 0u64;
        for queue in &mut guard.partitions {
            recovered += queue.in_flight.len() as u64;
            // Newest-consumed first, so the oldest ends up at the front.
            for payload in queue.in_flight.drain(..).rev() {
                queue.pending.push_front(payload);
            }
        }
        Ok(recovered)
    }

    async fn pending_len(&self, partition: u32) -> AppResult<u64> {
        let mut guard = self.state.lock().await;
        Ok(partition_mut(&mut guard.partitions, partition)?.pending.len() as u64)
    }

    async fn dead_letter_len(&self) -> AppResult<u64> {
        let guard = self.state.lock().await;
        Ok(guard.dead.len() as u64)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    // With 4 partitions, Uuid::from_u128(n) lands on partition n % 4.
    fn key(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[tokio::test]
    async fn test_consumes_oldest_first() {
        let broker = MemoryBroker::new(4);
        for payload in ["a", "b", "c"] {
            broker.publish(key(0), payload).await.unwrap();
        }

        for expected in ["a", "b", "c"] {
            let delivery = broker
                .consume(0, Duration::ZERO)
                .await
                .unwrap()
                .expect("message");
            assert_eq!(delivery.payload, expected);
            broker.ack(&delivery).await.unwrap();
        }
        assert_eq!(broker.pending_len(0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_requeue_retries_before_newer_messages() {
        let broker = MemoryBroker::new(4);
        broker.publish(key(0), "a").await.unwrap();
        broker.publish(key(0), "b").await.unwrap();

        let first = broker.consume(0, Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(first.payload, "a");
        assert_eq!(first.attempts, 0);
        assert_eq!(broker.requeue(&first).await.unwrap(), 1);

        let retry = broker.consume(0, Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(retry.payload, "a");
        assert_eq!(retry.attempts, 1);
        assert_eq!(broker.requeue(&retry).await.unwrap(), 2);

        let retry = broker.consume(0, Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(retry.attempts, 2);
        broker.ack(&retry).await.unwrap();

        let next = broker.consume(0, Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(next.payload, "b");
        assert_eq!(next.attempts, 0);
    }

    #[tokio::test]
    async fn test_dead_letter_drains_the_partition() {
        let broker = MemoryBroker::new(4);
        broker.publish(key(0), "poison").await.unwrap();

        let delivery = broker.consume(0, Duration::ZERO).await.unwrap().unwrap();
        broker
            .dead_letter(&delivery, "decode failed")
            .await
            .unwrap();

        assert_eq!(broker.dead_letter_len().await.unwrap(), 1);
        assert_eq!(broker.pending_len(0).await.unwrap(), 0);
        assert!(broker.consume(0, Duration::ZERO).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recover_restores_in_flight_in_order() {
        let broker = MemoryBroker::new(4);
        broker.publish(key(0), "a").await.unwrap();
        broker.publish(key(0), "b").await.unwrap();

        broker.consume(0, Duration::ZERO).await.unwrap().unwrap();
        broker.consume(0, Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(broker.pending_len(0).await.unwrap(), 0);

        assert_eq!(broker.recover().await.unwrap(), 2);
        assert_eq!(broker.pending_len(0).await.unwrap(), 2);

        let first = broker.consume(0, Duration::ZERO).await.unwrap().unwrap();
        let second = broker.consume(0, Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(first.payload, "a");
        assert_eq!(second.payload, "b");
    }

    #[tokio::test]
    async fn test_partition_for_is_stable() {
        let broker = MemoryBroker::new(4);
        assert_eq!(broker.partition_for(key(5)), 1);
        assert_eq!(broker.partition_for(key(5)), broker.partition_for(key(5)));

        broker.publish(key(5), "a").await.unwrap();
        assert_eq!(broker.pending_len(1).await.unwrap(), 1);
        assert_eq!(broker.pending_len(0).await.unwrap(), 0);
    }
}
