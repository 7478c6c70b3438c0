//! Broker manager wrapping the configured backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use claimgate_core::config::broker::BrokerConfig;
use claimgate_core::error::AppError;
use claimgate_core::result::AppResult;
use claimgate_core::traits::broker::{Delivery, IntentBroker};

use crate::memory::MemoryBroker;
#[cfg(feature = "redis-broker")]
use crate::redis::RedisBroker;

/// Broker manager that wraps the configured intent broker.
#[derive(Debug, Clone)]
pub struct BrokerManager {
    /// The inner broker backend.
    inner: Arc<dyn IntentBroker>,
}

impl BrokerManager {
    /// Create a new broker manager from configuration.
    pub async fn new(config: &BrokerConfig) -> AppResult<Self> {
        if config.partitions == 0 {
            return Err(AppError::configuration(
                "Broker partition count must be at least 1",
            ));
        }

        let inner: Arc<dyn IntentBroker> = match config.provider.as_str() {
            #[cfg(feature = "redis-broker")]
            "redis" => {
                info!(partitions = config.partitions, "Initializing Redis broker");
                Arc::new(RedisBroker::connect(&config.redis_url, config.partitions).await?)
            }
            "memory" => {
                info!(
                    partitions = config.partitions,
                    "Initializing in-memory broker"
                );
                Arc::new(MemoryBroker::new(config.partitions))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown broker provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a broker manager from an existing backend (for testing).
    pub fn from_provider(provider: Arc<dyn IntentBroker>) -> Self {
        Self { inner: provider }
    }
}

#[async_trait]
impl IntentBroker for BrokerManager {
    fn partitions(&self) -> u32 {
        self.inner.partitions()
    }

    fn partition_for(&self, key: Uuid) -> u32 {
        self.inner.partition_for(key)
    }

    async fn publish(&self, key: Uuid, payload: &str) -> AppResult<()> {
        self.inner.publish(key, payload).await
    }

    async fn consume(&self, partition: u32, wait: Duration) -> AppResult<Option<Delivery>> {
        self.inner.consume(partition, wait).await
    }

    async fn ack(&self, delivery: &Delivery) -> AppResult<()> {
        self.inner.ack(delivery).await
    }

    async fn requeue(&self, delivery: &Delivery) -> AppResult<u32> {
        self.inner.requeue(delivery).await
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> AppResult<()> {
        self.inner.dead_letter(delivery, reason).await
    }

    async fn recover(&self) -> AppResult<u64> {
        self.inner.recover().await
    }

    async fn pending_len(&self, partition: u32) -> AppResult<u64> {
        self.inner.pending_len(partition).await
    }

    async fn dead_letter_len(&self) -> AppResult<u64> {
        self.inner.dead_letter_len().await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
