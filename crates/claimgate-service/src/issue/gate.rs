//! Shared admission gate for the locked and queued strategies.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use claimgate_cache::{ResourceSnapshotCache, keys};
use claimgate_coordination::{CounterManager, LockManager};
use claimgate_core::config::issuance::IssuanceConfig;
use claimgate_core::error::AppError;
use claimgate_core::retry::with_backoff;
use claimgate_core::traits::counter::QuantityCounter;
use claimgate_core::traits::lock::{DistributedLock, LockGuard};
use claimgate_core::types::ResourceId;
use claimgate_database::stores::ResourceStore;
use claimgate_entity::resource::Resource;

/// Fast-path admission shared by the locked and queued strategies. The
/// per-resource lock serializes the check, the snapshot answers the
/// window question, and the counter is the capacity gate.
#[derive(Debug, Clone)]
pub(crate) struct AdmissionGate {
    resources: Arc<dyn ResourceStore>,
    lock: LockManager,
    counter: CounterManager,
    snapshots: ResourceSnapshotCache,
    lock_wait: Duration,
    lock_lease: Duration,
    retries: u32,
}

impl AdmissionGate {
    pub(crate) fn new(
        resources: Arc<dyn ResourceStore>,
        lock: LockManager,
        counter: CounterManager,
        snapshots: ResourceSnapshotCache,
        config: &IssuanceConfig,
    ) -> Self {
        Self {
            resources,
            lock,
            counter,
            snapshots,
            lock_wait: Duration::from_secs(config.lock_wait_seconds),
            lock_lease: Duration::from_secs(config.lock_lease_seconds),
            retries: config.provider_retries,
        }
    }

    /// Take the per-resource admission lock.
    pub(crate) async fn acquire(&self, resource_id: &ResourceId) -> Result<LockGuard, AppError> {
        self.lock
            .acquire(
                &keys::resource_lock(resource_id),
                self.lock_wait,
                self.lock_lease,
            )
            .await
    }

    /// Release the admission lock, logging instead of failing.
    pub(crate) async fn release(&self, guard: &LockGuard) {
        super::release_quietly(&self.lock, guard).await;
    }

    /// Admit `quantity` units or reject. Assumes the admission lock is
    /// held. On success the units are already deducted from the counter;
    /// a caller that fails to make them durable must call [`Self::surrender`].
    pub(crate) async fn admit(
        &self,
        resource_id: &ResourceId,
        quantity: i64,
    ) -> Result<Resource, AppError> {
        if quantity <= 0 {
            return Err(AppError::validation(format!(
                "Claim quantity must be positive, got {quantity}"
            )));
        }

        let resource = self.load(resource_id).await?;
        resource.check_window(Utc::now())?;

        self.ensure_seeded(resource_id).await?;

        let remaining = with_backoff("counter.decrement", self.retries, || {
            self.counter.decrement(resource_id, quantity)
        })
        .await?;

        if remaining < 0 {
            self.surrender(resource_id, quantity).await;
            return Err(AppError::exhausted(format!(
                "Resource '{}' has no remaining quantity for {quantity} unit(s)",
                resource.name
            )));
        }

        debug!(resource_id = %resource_id, quantity, remaining, "Admission granted");
        Ok(resource)
    }

    /// Return admitted units to the counter after a downstream failure.
    pub(crate) async fn surrender(&self, resource_id: &ResourceId, quantity: i64) {
        if let Err(e) = self.counter.increment(resource_id, quantity).await {
            warn!(
                resource_id = %resource_id,
                quantity,
                error = %e,
                "Failed to return units to the quantity counter"
            );
        }
    }

    /// Refresh the snapshot after a durable write (best effort).
    pub(crate) async fn refresh_snapshot(&self, resource: &Resource) {
        if let Err(e) = self.snapshots.put(resource).await {
            debug!(resource_id = %resource.id, error = %e, "Snapshot refresh failed");
        }
    }

    /// Read-through load: snapshot first, row on miss.
    async fn load(&self, resource_id: &ResourceId) -> Result<Resource, AppError> {
        match self.snapshots.get(resource_id).await {
            Ok(Some(resource)) => return Ok(resource),
            Ok(None) => {}
            Err(e) => debug!(resource_id = %resource_id, error = %e, "Snapshot read failed"),
        }

        let resource = self
            .resources
            .find(resource_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Resource not found: {resource_id}")))?;
        self.refresh_snapshot(&resource).await;
        Ok(resource)
    }

    /// Seed the counter when it has no value. The seed reads the durable
    /// row, not the snapshot: the snapshot may trail cancellations.
    async fn ensure_seeded(&self, resource_id: &ResourceId) -> Result<(), AppError> {
        let existing = with_backoff("counter.get", self.retries, || {
            self.counter.get(resource_id)
        })
        .await?;
        if existing.is_some() {
            return Ok(());
        }

        let fresh = self
            .resources
            .find(resource_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Resource not found: {resource_id}")))?;
        let created = self
            .counter
            .seed(resource_id, fresh.remaining_quantity)
            .await?;
        if created {
            info!(
                resource_id = %resource_id,
                remaining = fresh.remaining_quantity,
                "Seeded quantity counter from the durable record"
            );
        }
        Ok(())
    }
}
