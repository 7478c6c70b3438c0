//! In-memory lock provider using a Tokio mutex for single-node deployments.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use claimgate_core::error::AppError;
use claimgate_core::result::AppResult;
use claimgate_core::traits::lock::{DistributedLock, LockGuard};

#[derive(Debug)]
struct Holder {
    owner: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct LockTable {
    holders: HashMap<String, Holder>,
    fences: HashMap<String, u64>,
}

/// In-memory lock provider with the same lease and fencing semantics as
/// the Redis provider. Single-node deployments only.
#[derive(Debug, Clone)]
pub struct MemoryLockProvider {
    state: Arc<Mutex<LockTable>>,
    retry_interval: Duration,
}

impl MemoryLockProvider {
    /// Create a new in-memory lock provider.
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(LockTable::default())),
            retry_interval,
        }
    }
}

#[async_trait]
impl DistributedLock for MemoryLockProvider {
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
        let mut state = self.state.lock().await;
        let now = Instant::now();

        // An expired holder counts as absent, matching Redis key expiry.
        if let Some(holder) = state.holders.get(key) {
            if holder.expires_at > now {
                return Ok(None);
            }
        }

        let fence = {
            let fence = state.fences.entry(key.to_string()).or_insert(0);
            *fence += 1;
            *fence
        };
        let owner = Uuid::new_v4().to_string();
        state.holders.insert(
            key.to_string(),
            Holder {
                owner: owner.clone(),
                expires_at: now + lease,
            },
        );

        Ok(Some(LockGuard {
            key: key.to_string(),
            owner,
            fence,
            lease,
        }))
    }

    async fn is_held(&self, guard: &LockGuard) -> AppResult<bool> {
        let state = self.state.lock().await;
        let now = Instant::now();
        Ok(matches!(
            state.holders.get(&guard.key),
            Some(holder) if holder.owner == guard.owner && holder.expires_at > now
        ))
    }

    async fn release(&self, guard: &LockGuard) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let held = matches!(
            state.holders.get(&guard.key),
            Some(holder) if holder.owner == guard.owner && holder.expires_at > now
        );
        if held {
            state.holders.remove(&guard.key);
        }
        Ok(held)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimgate_core::error::ErrorKind;

    fn provider() -> MemoryLockProvider {
        MemoryLockProvider::new(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let lock = provider();
        let lease = Duration::from_secs(5);

        let guard = lock.try_acquire("res", lease).await.unwrap().unwrap();
        assert!(lock.is_held(&guard).await.unwrap());
        assert!(lock.try_acquire("res", lease).await.unwrap().is_none());

        assert!(lock.release(&guard).await.unwrap());
        assert!(!lock.is_held(&guard).await.unwrap());
        assert!(lock.try_acquire("res", lease).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_acquire_times_out() {
        let lock = provider();
        let _guard = lock
            .try_acquire("res", Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();

        let err = lock
            .acquire("res", Duration::from_millis(40), Duration::from_secs(60))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::LockTimeout);
    }

    #[tokio::test]
    async fn test_expired_lease_frees_the_lock() {
        let lock = provider();
        let guard = lock
            .try_acquire("res", Duration::from_millis(20))
            .await
            .unwrap()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        // The former holder's release reports failure, and a new holder
        // can get in without anyone cleaning up.
        let next = lock
            .try_acquire("res", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(next.is_some());
        assert!(!lock.release(&guard).await.unwrap());
        assert!(lock.is_held(&next.unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn test_fence_tokens_increase() {
        let lock = provider();
        let lease = Duration::from_secs(5);
        let mut last_fence = 0;
        for _ in 0..3 {
            let guard = lock.acquire("res", lease, lease).await.unwrap();
            assert!(guard.fence > last_fence);
            last_fence = guard.fence;
            lock.release(&guard).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_two_racers_one_winner() {
        let lock = Arc::new(provider());
        let lease = Duration::from_secs(5);

        let a = tokio::spawn({
            let lock = lock.clone();
            async move { lock.try_acquire("res", lease).await.unwrap() }
        });
        let b = tokio::spawn({
            let lock = lock.clone();
            async move { lock.try_acquire("res", lease).await.unwrap() }
        });

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a.is_some() as u8 + b.is_some() as u8, 1);
    }
}
