//! Distributed lock providers.
//!
//! Provides lease-based advisory locking using either:
//! - Redis SET NX PX with Lua compare-and-delete release (multi-node)
//! - In-memory mutex-guarded table (single-node and tests)

pub mod memory;
#[cfg(feature = "redis-coordination")]
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use claimgate_core::config::coordination::CoordinationConfig;
use claimgate_core::error::AppError;
use claimgate_core::result::AppResult;
use claimgate_core::traits::lock::{DistributedLock, LockGuard};

pub use memory::MemoryLockProvider;
#[cfg(feature = "redis-coordination")]
pub use redis::RedisLockProvider;

/// Lock manager that wraps the configured lock provider.
#[derive(Debug, Clone)]
pub struct LockManager {
    /// The inner lock provider.
    inner: Arc<dyn DistributedLock>,
}

impl LockManager {
    /// Create a new lock manager from configuration.
    pub async fn new(config: &CoordinationConfig) -> AppResult<Self> {
        let retry_interval = Duration::from_millis(config.retry_interval_ms);
        let inner: Arc<dyn DistributedLock> = match config.provider.as_str() {
            #[cfg(feature = "redis-coordination")]
            "redis" => {
                info!("Initializing Redis lock provider");
                Arc::new(RedisLockProvider::connect(&config.redis_url, retry_interval).await?)
            }
            "memory" => {
                info!("Initializing in-memory lock provider");
                Arc::new(MemoryLockProvider::new(retry_interval))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown lock provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a lock manager from an existing provider (for testing).
    pub fn from_provider(provider: Arc<dyn DistributedLock>) -> Self {
        Self { inner: provider }
    }
}

#[async_trait]
impl DistributedLock for LockManager {
    async fn acquire(&self, key: &str, wait: Duration, lease: Duration) -> AppResult<LockGuard> {
        self.inner.acquire(key, wait, lease).await
    }

    async fn try_acquire(&self, key: &str, lease: Duration) -> AppResult<Option<LockGuard>> {
        self.inner.try_acquire(key, lease).await
    }

    async fn is_held(&self, guard: &LockGuard) -> AppResult<bool> {
        self.inner.is_held(guard).await
    }

    async fn release(&self, guard: &LockGuard) -> AppResult<bool> {
        self.inner.release(guard).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
