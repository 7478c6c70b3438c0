//! Queue-decoupled issuance: admit now, persist asynchronously.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use claimgate_broker::BrokerManager;
use claimgate_cache::{PendingClaimCache, ResourceSnapshotCache};
use claimgate_coordination::{CounterManager, LockManager};
use claimgate_core::config::issuance::IssuanceConfig;
use claimgate_core::error::AppError;
use claimgate_core::traits::broker::IntentBroker;
use claimgate_core::types::{ClaimId, RequesterId, ResourceId};
use claimgate_database::stores::ResourceStore;
use claimgate_entity::claim::ClaimIntent;

use super::gate::AdmissionGate;
use super::{ClaimTicket, Issuer};

/// Admits claims at counter speed and defers the durable write to the
/// fulfillment worker. The requester gets a `Pending` ticket whose id
/// becomes the durable claim id.
#[derive(Debug, Clone)]
pub struct QueuedIssuer {
    gate: AdmissionGate,
    broker: BrokerManager,
    pending: PendingClaimCache,
}

impl QueuedIssuer {
    /// Creates a new queued issuer.
    pub fn new(
        resources: Arc<dyn ResourceStore>,
        lock: LockManager,
        counter: CounterManager,
        broker: BrokerManager,
        snapshots: ResourceSnapshotCache,
        pending: PendingClaimCache,
        config: &IssuanceConfig,
    ) -> Self {
        Self {
            gate: AdmissionGate::new(resources, lock, counter, snapshots, config),
            broker,
            pending,
        }
    }

    async fn admit_and_enqueue(
        &self,
        resource_id: &ResourceId,
        requester_id: &RequesterId,
        quantity: i64,
    ) -> Result<ClaimTicket, AppError> {
        self.gate.admit(resource_id, quantity).await?;

        let intent = ClaimIntent {
            claim_id: ClaimId::new(),
            resource_id: *resource_id,
            requester_id: *requester_id,
            quantity,
            enqueued_at: Utc::now(),
        };

        // Marker before publish: a status probe that races fulfillment
        // must see Pending, never NotFound.
        if let Err(e) = self.pending.mark(&intent).await {
            self.gate.surrender(resource_id, quantity).await;
            return Err(e);
        }

        let payload = match intent.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                self.abandon(&intent).await;
                return Err(e);
            }
        };
        if let Err(e) = self.broker.publish(resource_id.into_uuid(), &payload).await {
            self.abandon(&intent).await;
            return Err(e);
        }

        info!(
            claim_id = %intent.claim_id,
            resource_id = %resource_id,
            requester_id = %requester_id,
            quantity,
            "Claim admitted and queued"
        );
        Ok(ClaimTicket::pending(&intent))
    }

    /// Roll back an admission that never reached the queue.
    async fn abandon(&self, intent: &ClaimIntent) {
        if let Err(e) = self.pending.clear(&intent.claim_id).await {
            debug!(claim_id = %intent.claim_id, error = %e, "Failed to clear pending marker");
        }
        self.gate
            .surrender(&intent.resource_id, intent.quantity)
            .await;
    }
}

#[async_trait]
impl Issuer for QueuedIssuer {
    async fn issue(
        &self,
        resource_id: &ResourceId,
        requester_id: &RequesterId,
        quantity: i64,
    ) -> Result<ClaimTicket, AppError> {
        let guard = self.gate.acquire(resource_id).await?;
        let outcome = self
            .admit_and_enqueue(resource_id, requester_id, quantity)
            .await;
        self.gate.release(&guard).await;
        outcome
    }
}
