//! Distributed advisory lock trait.
//!
//! The lock serializes check-then-act sequences across processes. It is
//! advisory: correctness of the hard capacity bound never rests on the lock
//! alone (the quantity counter is atomic on its own).

use std::time::Duration;

use async_trait::async_trait;

use crate::result::AppResult;

/// Handle to a held lock.
///
/// The guard is pure data, not a RAII type: release happens over the
/// network and must be awaited, so the coordinator calls
/// [`DistributedLock::release`] explicitly in its cleanup path.
#[derive(Debug, Clone)]
pub struct LockGuard {
    /// The lock key.
    pub key: String,
    /// Owner token unique to this acquisition. Release only succeeds while
    /// the key still stores this token.
    pub owner: String,
    /// Monotonic fencing token minted at acquisition. Strictly increasing
    /// per key across all holders; downstream writes may use it to reject
    /// a revived holder that lost its lease.
    pub fence: u64,
    /// The lease granted at acquisition.
    pub lease: Duration,
}

/// Trait for distributed lock backends (Redis or in-memory).
///
/// Semantics:
/// - `acquire` blocks up to `wait`, then fails with a `LockTimeout` error.
/// - The lease auto-expires, so a crashed holder blocks others for at most
///   `lease`.
/// - `release` is compare-and-delete on the owner token: it returns `false`
///   (not an error) when the lease already expired or the key is held by a
///   newer owner.
#[async_trait]
pub trait DistributedLock: Send + Sync + std::fmt::Debug + 'static {
    /// Acquire the lock, waiting up to `wait`. The returned guard's lease
    /// starts when the underlying key is set.
    async fn acquire(&self, key: &str, wait: Duration, lease: Duration) -> AppResult<LockGuard>;

    /// Single acquisition attempt without waiting.
    async fn try_acquire(&self, key: &str, lease: Duration) -> AppResult<Option<LockGuard>>;

    /// Whether the guard's owner token still holds the lock.
    async fn is_held(&self, guard: &LockGuard) -> AppResult<bool>;

    /// Release the lock if this guard still owns it. Returns `true` if the
    /// lock was released, `false` if the lease had already expired or been
    /// reacquired by someone else.
    async fn release(&self, guard: &LockGuard) -> AppResult<bool>;

    /// Check that the lock backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
