//! Redis-backed intent broker using the reliable-list pattern.
//!
//! Each partition is a pair of lists: a pending list and a working list.
//! Consuming LMOVEs the oldest pending message onto the working list, where
//! it stays until acked, requeued, or dead-lettered. Messages stranded on a
//! working list by a dead consumer are moved back at startup.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::warn;

use claimgate_core::error::{AppError, ErrorKind};
use claimgate_core::result::AppResult;
use claimgate_core::traits::broker::{Delivery, IntentBroker};

/// Interval between LMOVE polls while a consumer waits for work.
///
/// LMOVE with a short poll instead of BLMOVE: blocking commands would hold
/// the multiplexed connection for every other caller.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Hash of payload -> failed delivery attempts.
const ATTEMPTS_KEY: &str = "claimgate:intents:attempts";

/// List of dead-lettered payloads.
const DEAD_KEY: &str = "claimgate:intents:dead";

fn pending_key(partition: u32) -> String {
    format!("claimgate:intents:{partition}")
}

fn working_key(partition: u32) -> String {
    format!("claimgate:intents:{partition}:working")
}

/// Redis-backed broker for multi-node deployments.
#[derive(Debug, Clone)]
pub struct RedisBroker {
    /// Redis connection manager.
    conn: redis::aio::ConnectionManager,
    /// Number of partitions.
    partitions: u32,
}

impl RedisBroker {
    /// Connect to Redis and build the broker backend.
    pub async fn connect(redis_url: &str, partitions: u32) -> AppResult<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            AppError::with_source(ErrorKind::Broker, "Failed to create Redis client", e)
        })?;

        let conn = client.get_connection_manager().await.map_err(|e| {
            AppError::with_source(ErrorKind::Broker, "Failed to connect to Redis", e)
        })?;

        Ok(Self { conn, partitions })
    }

    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Broker, format!("Redis broker error: {e}"), e)
    }
}

#[async_trait]
impl IntentBroker for RedisBroker {
    fn partitions(&self) -> u32 {
        self.partitions
    }

    async fn publish(&self, key: uuid::Uuid, payload: &str) -> AppResult<()> {
        let partition = self.partition_for(key);
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .lpush(pending_key(partition), payload)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn consume(&self, partition: u32, wait: Duration) -> AppResult<Option<Delivery>> {
        let deadline = Instant::now() + wait;
        let mut conn = self.conn.clone();
        loop {
            // LMOVE pending working RIGHT LEFT: take the oldest pending
            // message and park it on the working list in one step.
            let payload: Option<String> = redis::cmd("LMOVE")
                .arg(pending_key(partition))
                .arg(working_key(partition))
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await
                .map_err(Self::map_err)?;

            if let Some(payload) = payload {
                let attempts: Option<u32> = conn
                    .hget(ATTEMPTS_KEY, &payload)
                    .await
                    .map_err(Self::map_err)?;
                return Ok(Some(Delivery {
                    partition,
                    payload,
                    attempts: attempts.unwrap_or(0),
                }));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .lrem(working_key(delivery.partition), 1, &delivery.payload)
            .ignore()
            .hdel(ATTEMPTS_KEY, &delivery.payload)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn requeue(&self, delivery: &Delivery) -> AppResult<u32> {
        let mut conn = self.conn.clone();
        // RPUSH puts the message at the consuming end, so the retry happens
        // before anything queued behind it and per-key order holds.
        let (attempts,): (u32,) = redis::pipe()
            .atomic()
            .lrem(working_key(delivery.partition), 1, &delivery.payload)
            .ignore()
            .rpush(pending_key(delivery.partition), &delivery.payload)
            .ignore()
            .hincr(ATTEMPTS_KEY, &delivery.payload, 1)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(attempts)
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> AppResult<()> {
        warn!(
            partition = delivery.partition,
            attempts = delivery.attempts,
            reason,
            "Dead-lettering claim intent"
        );
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .lrem(working_key(delivery.partition), 1, &delivery.payload)
            .ignore()
            .lpush(DEAD_KEY, &delivery.payload)
            .ignore()
            .hdel(ATTEMPTS_KEY, &delivery.payload)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn recover(&self) -> AppResult<u64> {
        // Runs before consumers start, so the read-then-move pair does not
        // race with an active LMOVE.
        let mut conn = self.conn.clone();
        let mut recovered = 0u64;
        for partition in 0..self.partitions {
            let stranded: Vec<String> = conn
                .lrange(working_key(partition), 0, -1)
                .await
                .map_err(Self::map_err)?;
            if stranded.is_empty() {
                continue;
            }

            // LRANGE yields newest-consumed first; RPUSH in that order puts
            // the oldest message back at the consuming end.
            let mut pipe = redis::pipe();
            pipe.atomic();
            for payload in &stranded {
                pipe.rpush(pending_key(partition), payload).ignore();
            }
            pipe.del(working_key(partition)).ignore();
            pipe.query_async::<()>(&mut conn)
                .await
                .map_err(Self::map_err)?;

            recovered += stranded.len() as u64;
        }
        Ok(recovered)
    }

    async fn pending_len(&self, partition: u32) -> AppResult<u64> {
        let mut conn = self.conn.clone();
        conn.llen(pending_key(partition))
            .await
            .map_err(Self::map_err)
    }

    async fn dead_letter_len(&self) -> AppResult<u64> {
        let mut conn = self.conn.clone();
        conn.llen(DEAD_KEY).await.map_err(Self::map_err)
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(pong == "PONG")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(pending_key(2), "claimgate:intents:2");
        assert_eq!(working_key(2), "claimgate:intents:2:working");
    }
}
