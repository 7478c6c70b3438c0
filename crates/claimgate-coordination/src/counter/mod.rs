//! Atomic remaining-quantity counters.
//!
//! The counter is the fast admission gate in front of the durable record:
//! it is seeded from the record, decremented on every issuance attempt, and
//! rebuilt from the record whenever it drifts or disappears.

pub mod memory;
#[cfg(feature = "redis-coordination")]
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use claimgate_core::config::coordination::CoordinationConfig;
use claimgate_core::error::AppError;
use claimgate_core::result::AppResult;
use claimgate_core::traits::counter::QuantityCounter;
use claimgate_core::types::id::ResourceId;

pub use memory::MemoryQuantityCounter;
#[cfg(feature = "redis-coordination")]
pub use redis::RedisQuantityCounter;

/// Counter manager that wraps the configured counter backend.
#[derive(Debug, Clone)]
pub struct CounterManager {
    /// The inner counter backend.
    inner: Arc<dyn QuantityCounter>,
}

impl CounterManager {
    /// Create a new counter manager from configuration.
    pub async fn new(config: &CoordinationConfig) -> AppResult<Self> {
        let inner: Arc<dyn QuantityCounter> = match config.provider.as_str() {
            #[cfg(feature = "redis-coordination")]
            "redis" => {
                info!("Initializing Redis quantity counter");
                Arc::new(RedisQuantityCounter::connect(&config.redis_url).await?)
            }
            "memory" => {
                info!("Initializing in-memory quantity counter");
                Arc::new(MemoryQuantityCounter::new())
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown counter provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a counter manager from an existing backend (for testing).
    pub fn from_provider(provider: Arc<dyn QuantityCounter>) -> Self {
        Self { inner: provider }
    }
}

#[async_trait]
impl QuantityCounter for CounterManager {
    async fn seed(&self, resource_id: &ResourceId, quantity: i64) -> AppResult<bool> {
        self.inner.seed(resource_id, quantity).await
    }

    async fn decrement(&self, resource_id: &ResourceId, by: i64) -> AppResult<i64> {
        self.inner.decrement(resource_id, by).await
    }

    async fn increment(&self, resource_id: &ResourceId, by: i64) -> AppResult<i64> {
        self.inner.increment(resource_id, by).await
    }

    async fn get(&self, resource_id: &ResourceId) -> AppResult<Option<i64>> {
        self.inner.get(resource_id).await
    }

    async fn force_set(&self, resource_id: &ResourceId, quantity: i64) -> AppResult<()> {
        self.inner.force_set(resource_id, quantity).await
    }

    async fn remove(&self, resource_id: &ResourceId) -> AppResult<()> {
        self.inner.remove(resource_id).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
