//! Claim issuance strategies.
//!
//! All strategies converge on the same durable outcome: a claim row
//! inserted and the resource quantity deducted, never below zero. They
//! differ in what happens between the request and that write:
//!
//! - [`DirectIssuer`]: one row-locked database transaction.
//! - [`LockedIssuer`]: distributed lock and counter admission, then a
//!   guarded synchronous write.
//! - [`QueuedIssuer`]: the same admission, with the write deferred to the
//!   fulfillment worker.

mod direct;
mod gate;
mod locked;
mod queued;

pub use direct::DirectIssuer;
pub use locked::LockedIssuer;
pub use queued::QueuedIssuer;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use claimgate_broker::BrokerManager;
use claimgate_cache::{PendingClaimCache, ResourceSnapshotCache};
use claimgate_coordination::{CounterManager, LockManager};
use claimgate_core::config::issuance::IssuanceConfig;
use claimgate_core::error::AppError;
use claimgate_core::traits::lock::{DistributedLock, LockGuard};
use claimgate_core::types::{ClaimId, RequesterId, ResourceId};
use claimgate_database::stores::ResourceStore;
use claimgate_entity::claim::{Claim, ClaimIntent, ClaimStatus};

/// What a requester gets back from an issuance attempt.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClaimTicket {
    /// Claim id, durable or pending.
    pub claim_id: ClaimId,
    /// Redemption code derived from the id.
    pub code: String,
    /// `Issued` once durable, `Pending` while awaiting fulfillment.
    pub status: ClaimStatus,
}

impl ClaimTicket {
    pub(crate) fn issued(claim: &Claim) -> Self {
        Self {
            claim_id: claim.id,
            code: claim.code.clone(),
            status: claim.status,
        }
    }

    pub(crate) fn pending(intent: &ClaimIntent) -> Self {
        Self {
            claim_id: intent.claim_id,
            code: Claim::short_code(&intent.claim_id),
            status: ClaimStatus::Pending,
        }
    }
}

/// A claim issuance strategy.
#[async_trait]
pub trait Issuer: Send + Sync + std::fmt::Debug {
    /// Attempt to issue `quantity` units of `resource_id` to
    /// `requester_id`.
    async fn issue(
        &self,
        resource_id: &ResourceId,
        requester_id: &RequesterId,
        quantity: i64,
    ) -> Result<ClaimTicket, AppError>;
}

/// Release a lock, logging instead of failing. An expired or failed
/// release must not overwrite the issuance outcome.
pub(crate) async fn release_quietly(lock: &LockManager, guard: &LockGuard) {
    match lock.release(guard).await {
        Ok(true) => {}
        Ok(false) => warn!(key = %guard.key, "Lock expired before release"),
        Err(e) => warn!(key = %guard.key, error = %e, "Failed to release lock"),
    }
}

/// Build the issuer named by the configured strategy.
pub fn build_issuer(
    config: &IssuanceConfig,
    resources: Arc<dyn ResourceStore>,
    lock: LockManager,
    counter: CounterManager,
    broker: BrokerManager,
    snapshots: ResourceSnapshotCache,
    pending: PendingClaimCache,
) -> Result<Arc<dyn Issuer>, AppError> {
    match config.strategy.as_str() {
        "direct" => Ok(Arc::new(DirectIssuer::new(resources, snapshots))),
        "locked" => Ok(Arc::new(LockedIssuer::new(
            resources, lock, counter, snapshots, config,
        ))),
        "queued" => Ok(Arc::new(QueuedIssuer::new(
            resources, lock, counter, broker, snapshots, pending, config,
        ))),
        other => Err(AppError::configuration(format!(
            "Unknown issuance strategy: '{other}'. Supported: direct, locked, queued"
        ))),
    }
}
