//! Quantity counter trait — the fast admission gate.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::id::ResourceId;

/// Trait for the distributed atomic remaining-quantity counter.
///
/// The counter is an accelerator, never the source of truth: it is seeded
/// from the durable Resource Record and may be rebuilt from it at any time.
/// Decrements are atomic independent of any lock, which makes the counter a
/// hard capacity bound even when the advisory lock is bypassed: a decrement
/// that lands below zero is compensated with an increment by the caller.
#[async_trait]
pub trait QuantityCounter: Send + Sync + std::fmt::Debug + 'static {
    /// Seed the counter for a resource if it has no value yet.
    /// Returns `true` if this call created the counter.
    async fn seed(&self, resource_id: &ResourceId, quantity: i64) -> AppResult<bool>;

    /// Atomically subtract `by` and return the new value.
    async fn decrement(&self, resource_id: &ResourceId, by: i64) -> AppResult<i64>;

    /// Atomically add `by` and return the new value.
    async fn increment(&self, resource_id: &ResourceId, by: i64) -> AppResult<i64>;

    /// Current counter value, or `None` if the counter was never seeded or
    /// has been lost.
    async fn get(&self, resource_id: &ResourceId) -> AppResult<Option<i64>>;

    /// Overwrite the counter unconditionally (reconciler rebuild).
    async fn force_set(&self, resource_id: &ResourceId, quantity: i64) -> AppResult<()>;

    /// Drop the counter entry.
    async fn remove(&self, resource_id: &ResourceId) -> AppResult<()>;

    /// Check that the counter backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
