//! Lock-and-counter issuance with a synchronous durable write.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use claimgate_cache::ResourceSnapshotCache;
use claimgate_coordination::{CounterManager, LockManager};
use claimgate_core::config::issuance::IssuanceConfig;
use claimgate_core::error::{AppError, ErrorKind};
use claimgate_core::types::{ClaimId, RequesterId, ResourceId};
use claimgate_database::stores::{ClaimPersisted, ResourceStore};
use claimgate_entity::claim::Claim;

use super::gate::AdmissionGate;
use super::{ClaimTicket, Issuer};

/// Issues claims behind the distributed admission gate, then persists
/// synchronously. Requesters get a durable claim or a definitive
/// rejection, and the database only ever sees pre-admitted writes.
#[derive(Debug, Clone)]
pub struct LockedIssuer {
    resources: Arc<dyn ResourceStore>,
    gate: AdmissionGate,
}

impl LockedIssuer {
    /// Creates a new locked issuer.
    pub fn new(
        resources: Arc<dyn ResourceStore>,
        lock: LockManager,
        counter: CounterManager,
        snapshots: ResourceSnapshotCache,
        config: &IssuanceConfig,
    ) -> Self {
        let gate = AdmissionGate::new(resources.clone(), lock, counter, snapshots, config);
        Self { resources, gate }
    }

    async fn issue_admitted(
        &self,
        resource_id: &ResourceId,
        requester_id: &RequesterId,
        quantity: i64,
    ) -> Result<ClaimTicket, AppError> {
        self.gate.admit(resource_id, quantity).await?;

        let claim = Claim::issue(
            ClaimId::new(),
            *resource_id,
            *requester_id,
            quantity,
            Utc::now(),
        );
        match self.resources.persist_claim(&claim).await {
            Ok(ClaimPersisted::Inserted(resource)) => {
                self.gate.refresh_snapshot(&resource).await;
                info!(
                    claim_id = %claim.id,
                    resource_id = %resource_id,
                    requester_id = %requester_id,
                    quantity,
                    "Claim issued (locked)"
                );
                Ok(ClaimTicket::issued(&claim))
            }
            Ok(ClaimPersisted::Duplicate) => {
                self.gate.surrender(resource_id, quantity).await;
                Err(AppError::internal(format!(
                    "Freshly minted claim id collided on insert: {}",
                    claim.id
                )))
            }
            Err(e) if e.kind == ErrorKind::Exhausted => {
                // The counter admitted more than the row holds. Leave the
                // counter low; the reconciler trues it up from the row.
                warn!(
                    resource_id = %resource_id,
                    quantity,
                    "Guarded write rejected a counter-admitted claim"
                );
                Err(e)
            }
            Err(e) => {
                self.gate.surrender(resource_id, quantity).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Issuer for LockedIssuer {
    async fn issue(
        &self,
        resource_id: &ResourceId,
        requester_id: &RequesterId,
        quantity: i64,
    ) -> Result<ClaimTicket, AppError> {
        let guard = self.gate.acquire(resource_id).await?;
        let outcome = self
            .issue_admitted(resource_id, requester_id, quantity)
            .await;
        self.gate.release(&guard).await;
        outcome
    }
}
