//! Redis-based distributed lock using SET NX PX and Lua scripts.
//!
//! Suitable for multi-node deployments.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use uuid::Uuid;

use claimgate_core::error::{AppError, ErrorKind};
use claimgate_core::result::AppResult;
use claimgate_core::traits::lock::{DistributedLock, LockGuard};

/// Lua script for owner-checked release.
///
/// KEYS[1] = lock key
/// ARGV[1] = owner token
///
/// Returns 1 if the key held our token and was deleted, 0 otherwise.
/// Doing the compare and the delete in one script closes the window where
/// an expired holder would delete a newer holder's lock.
const RELEASE_SCRIPT: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    else
        return 0
    end
"#;

/// Redis-based lock provider for multi-node deployments.
#[derive(Debug, Clone)]
pub struct RedisLockProvider {
    /// Redis connection manager.
    conn: redis::aio::ConnectionManager,
    /// Interval between acquisition attempts while waiting.
    retry_interval: Duration,
}

impl RedisLockProvider {
    /// Connect to Redis and build the lock provider.
    pub async fn connect(redis_url: &str, retry_interval: Duration) -> AppResult<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            AppError::with_source(ErrorKind::Lock, "Failed to create Redis client", e)
        })?;

        let conn = client.get_connection_manager().await.map_err(|e| {
            AppError::with_source(ErrorKind::Lock, "Failed to connect to Redis", e)
        })?;

        Ok(Self {
            conn,
            retry_interval,
        })
    }

    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Lock, format!("Redis lock error: {e}"), e)
    }

    /// Key of the per-lock fence counter.
    fn fence_key(key: &str) -> String {
        format!("{key}:fence")
    }
}

#[async_trait]
impl DistributedLock for RedisLockProvider {
    async fn acquire(&self, key: &str, wait: Duration, lease: Duration) -> AppResult<LockGuard> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(guard) = self.try_acquire(key, lease).await? {
                return Ok(guard);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(AppError::lock_timeout(format!(
                    "Timed out after {}ms waiting for lock '{key}'",
                    wait.as_millis()
                )));
            }
            tokio::time::sleep(self.retry_interval.min(deadline - now)).await;
        }
    }

    async fn try_acquire(&self, key: &str, lease: Duration) -> AppResult<Option<LockGuard>> {
        let owner = Uuid::new_v4().to_string();
        let mut conn = self.conn.clone();

        // SET key owner PX lease NX
        let set: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&owner)
            .arg("PX")
            .arg(lease.as_millis() as u64)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        if set.is_none() {
            return Ok(None);
        }

        // The fence counter never expires, so tokens stay strictly
        // increasing across the lifetime of the key space.
        let fence: u64 = conn
            .incr(Self::fence_key(key), 1i64)
            .await
            .map_err(Self::map_err)?;

        Ok(Some(LockGuard {
            key: key.to_string(),
            owner,
            fence,
            lease,
        }))
    }

    async fn is_held(&self, guard: &LockGuard) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let holder: Option<String> = conn.get(&guard.key).await.map_err(Self::map_err)?;
        Ok(holder.as_deref() == Some(guard.owner.as_str()))
    }

    async fn release(&self, guard: &LockGuard) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let released: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&guard.key)
            .arg(&guard.owner)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(released == 1)
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
