//! Domain caches built on top of the raw provider.

use std::time::Duration;

use claimgate_core::result::AppResult;
use claimgate_core::traits::cache::CacheProvider;
use claimgate_core::types::{ClaimId, ResourceId};
use claimgate_entity::claim::ClaimIntent;
use claimgate_entity::resource::Resource;

use crate::keys;
use crate::provider::CacheManager;

/// Read-through cache of resource snapshots.
///
/// A snapshot mirrors the database row and may lag behind it by one
/// refresh. Admission decisions taken from a snapshot are backstopped by
/// the quantity counter and the guarded database write, so a stale
/// snapshot can cost a round trip but never oversell.
#[derive(Debug, Clone)]
pub struct ResourceSnapshotCache {
    cache: CacheManager,
    ttl: Duration,
}

impl ResourceSnapshotCache {
    /// Create a snapshot cache with the given entry TTL.
    pub fn new(cache: CacheManager, ttl_seconds: u64) -> Self {
        Self {
            cache,
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Fetch the cached snapshot, if any.
    pub async fn get(&self, resource_id: &ResourceId) -> AppResult<Option<Resource>> {
        self.cache
            .get_json(&keys::resource_snapshot(resource_id))
            .await
    }

    /// Store a fresh snapshot.
    pub async fn put(&self, resource: &Resource) -> AppResult<()> {
        self.cache
            .set_json(&keys::resource_snapshot(&resource.id), resource, self.ttl)
            .await
    }

    /// Drop the snapshot so the next read goes to the database.
    pub async fn invalidate(&self, resource_id: &ResourceId) -> AppResult<()> {
        self.cache.delete(&keys::resource_snapshot(resource_id)).await
    }
}

/// Markers for claims admitted but not yet persisted.
///
/// Queue-decoupled issuance acknowledges a claim before its row exists.
/// The marker bridges that gap for status lookups: present means
/// `Pending`, absent means the claim either became durable or never
/// existed. The TTL bounds how long a claim lost to a worker failure can
/// keep reporting `Pending`.
#[derive(Debug, Clone)]
pub struct PendingClaimCache {
    cache: CacheManager,
    ttl: Duration,
}

impl PendingClaimCache {
    /// Create a pending-claim cache with the given marker TTL.
    pub fn new(cache: CacheManager, ttl_seconds: u64) -> Self {
        Self {
            cache,
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Record an admitted claim.
    pub async fn mark(&self, intent: &ClaimIntent) -> AppResult<()> {
        self.cache
            .set_json(&keys::pending_claim(&intent.claim_id), intent, self.ttl)
            .await
    }

    /// Fetch the marker for a claim, if it is still pending.
    pub async fn get(&self, claim_id: &ClaimId) -> AppResult<Option<ClaimIntent>> {
        self.cache.get_json(&keys::pending_claim(claim_id)).await
    }

    /// Remove the marker once the claim is durable (or abandoned).
    pub async fn clear(&self, claim_id: &ClaimId) -> AppResult<()> {
        self.cache.delete(&keys::pending_claim(claim_id)).await
    }
}
