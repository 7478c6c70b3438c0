//! In-memory quantity counter for single-node deployments.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use claimgate_core::result::AppResult;
use claimgate_core::traits::counter::QuantityCounter;
use claimgate_core::types::id::ResourceId;

/// In-memory counter backend.
///
/// Decrements go through `fetch_sub` on a per-resource atomic, giving the
/// same "each racer observes a distinct post-decrement value" property as
/// Redis DECRBY. Like Redis, a counter that was never seeded is treated
/// as zero when incremented or decremented.
#[derive(Debug, Default)]
pub struct MemoryQuantityCounter {
    counters: DashMap<ResourceId, AtomicI64>,
}

impl MemoryQuantityCounter {
    /// Create a new in-memory counter backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuantityCounter for MemoryQuantityCounter {
    async fn seed(&self, resource_id: &ResourceId, quantity: i64) -> AppResult<bool> {
        match self.counters.entry(*resource_id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(AtomicI64::new(quantity));
                Ok(true)
            }
        }
    }

    async fn decrement(&self, resource_id: &ResourceId, by: i64) -> AppResult<i64> {
        let counter = self
            .counters
            .entry(*resource_id)
            .or_insert_with(|| AtomicI64::new(0));
        Ok(counter.fetch_sub(by, Ordering::SeqCst) - by)
    }

    async fn increment(&self, resource_id: &ResourceId, by: i64) -> AppResult<i64> {
        let counter = self
            .counters
            .entry(*resource_id)
            .or_insert_with(|| AtomicI64::new(0));
        Ok(counter.fetch_add(by, Ordering::SeqCst) + by)
    }

    async fn get(&self, resource_id: &ResourceId) -> AppResult<Option<i64>> {
        Ok(self
            .counters
            .get(resource_id)
            .map(|counter| counter.load(Ordering::SeqCst)))
    }

    async fn force_set(&self, resource_id: &ResourceId, quantity: i64) -> AppResult<()> {
        self.counters
            .insert(*resource_id, AtomicI64::new(quantity));
        Ok(())
    }

    async fn remove(&self, resource_id: &ResourceId) -> AppResult<()> {
        self.counters.remove(resource_id);
        Ok(())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
