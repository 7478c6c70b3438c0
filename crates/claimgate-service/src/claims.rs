//! Claim lifecycle operations.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use claimgate_cache::{PendingClaimCache, ResourceSnapshotCache};
use claimgate_coordination::CounterManager;
use claimgate_core::error::{AppError, ErrorKind};
use claimgate_core::traits::counter::QuantityCounter;
use claimgate_core::types::{ClaimId, RequesterId, ResourceId};
use claimgate_database::stores::{ClaimStore, ResourceStore};
use claimgate_entity::claim::Claim;

use crate::issue::{ClaimTicket, Issuer};
use crate::metrics::{IssueMetrics, MetricsSnapshot};

/// Handles the claim lifecycle: issuance, status, redemption, and
/// cancellation.
#[derive(Debug, Clone)]
pub struct ClaimService {
    /// Configured issuance strategy.
    issuer: Arc<dyn Issuer>,
    /// Claim store.
    claims: Arc<dyn ClaimStore>,
    /// Resource store.
    resources: Arc<dyn ResourceStore>,
    /// Markers for admitted-but-not-durable claims.
    pending: PendingClaimCache,
    /// Resource snapshot cache.
    snapshots: ResourceSnapshotCache,
    /// Fast remaining-quantity counter.
    counter: CounterManager,
    /// Issuance outcome counters.
    metrics: Arc<IssueMetrics>,
}

impl ClaimService {
    /// Creates a new claim service.
    pub fn new(
        issuer: Arc<dyn Issuer>,
        claims: Arc<dyn ClaimStore>,
        resources: Arc<dyn ResourceStore>,
        pending: PendingClaimCache,
        snapshots: ResourceSnapshotCache,
        counter: CounterManager,
        metrics: Arc<IssueMetrics>,
    ) -> Self {
        Self {
            issuer,
            claims,
            resources,
            pending,
            snapshots,
            counter,
            metrics,
        }
    }

    /// Attempt to issue a claim through the configured strategy.
    pub async fn issue(
        &self,
        resource_id: &ResourceId,
        requester_id: &RequesterId,
        quantity: i64,
    ) -> Result<ClaimTicket, AppError> {
        let outcome = self.issuer.issue(resource_id, requester_id, quantity).await;
        self.metrics.record(&outcome);
        outcome
    }

    /// Look up a claim's current state as seen by its owner.
    ///
    /// A claim that was admitted but is not durable yet is reported from
    /// its pending marker. A claim belonging to another requester is
    /// indistinguishable from a missing one.
    pub async fn get_status(
        &self,
        claim_id: &ClaimId,
        requester_id: &RequesterId,
    ) -> Result<Claim, AppError> {
        if let Some(claim) = self.claims.find(claim_id).await? {
            if claim.requester_id == *requester_id {
                return Ok(claim);
            }
            return Err(AppError::not_found(format!("Claim {claim_id} not found")));
        }

        if let Some(intent) = self.pending.get(claim_id).await? {
            if intent.requester_id == *requester_id {
                return Ok(Claim::pending(&intent));
            }
        }

        Err(AppError::not_found(format!("Claim {claim_id} not found")))
    }

    /// Redeem an issued claim against an order.
    pub async fn use_claim(
        &self,
        claim_id: &ClaimId,
        requester_id: &RequesterId,
        order_ref: &str,
    ) -> Result<Claim, AppError> {
        let order_ref = order_ref.trim();
        if order_ref.is_empty() {
            return Err(AppError::validation("Order reference must not be empty"));
        }

        match self
            .claims
            .mark_used(claim_id, requester_id, order_ref, Utc::now())
            .await
        {
            Ok(claim) => {
                info!(claim_id = %claim.id, order_ref, "Claim used");
                Ok(claim)
            }
            Err(e) if e.kind == ErrorKind::NotFound => {
                Err(self.explain_missing(claim_id, requester_id, e).await)
            }
            Err(e) => Err(e),
        }
    }

    /// Cancel a claim, returning its quantity to the resource.
    pub async fn cancel_claim(
        &self,
        claim_id: &ClaimId,
        requester_id: &RequesterId,
    ) -> Result<Claim, AppError> {
        let (claim, resource) = match self
            .resources
            .cancel_claim(claim_id, requester_id, Utc::now())
            .await
        {
            Ok(pair) => pair,
            Err(e) if e.kind == ErrorKind::NotFound => {
                return Err(self.explain_missing(claim_id, requester_id, e).await);
            }
            Err(e) => return Err(e),
        };

        // Hand the capacity back to the fast path (best effort; the
        // reconciler repairs any missed step).
        match self.counter.get(&claim.resource_id).await {
            Ok(Some(_)) => {
                if let Err(e) = self
                    .counter
                    .increment(&claim.resource_id, claim.quantity)
                    .await
                {
                    warn!(
                        resource_id = %claim.resource_id,
                        error = %e,
                        "Failed to return cancelled units to the counter"
                    );
                }
            }
            Ok(None) => {}
            Err(e) => warn!(
                resource_id = %claim.resource_id,
                error = %e,
                "Counter read failed after cancellation"
            ),
        }
        if let Err(e) = self.snapshots.put(&resource).await {
            debug!(resource_id = %resource.id, error = %e, "Snapshot refresh failed");
        }

        info!(
            claim_id = %claim.id,
            resource_id = %claim.resource_id,
            quantity = claim.quantity,
            "Claim cancelled, capacity returned"
        );
        Ok(claim)
    }

    /// A requester's claims, newest first.
    pub async fn claims_for(&self, requester_id: &RequesterId) -> Result<Vec<Claim>, AppError> {
        self.claims.list_for_requester(requester_id).await
    }

    /// Best available remaining capacity for a resource: the counter when
    /// it is alive, the durable row otherwise.
    pub async fn remaining_capacity(&self, resource_id: &ResourceId) -> Result<i64, AppError> {
        match self.counter.get(resource_id).await {
            Ok(Some(value)) => return Ok(value.max(0)),
            Ok(None) => {}
            Err(e) => debug!(
                resource_id = %resource_id,
                error = %e,
                "Counter read failed, falling back to the row"
            ),
        }

        let resource = self
            .resources
            .find(resource_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Resource not found: {resource_id}")))?;

        // Opportunistic seed so the next caller hits the counter.
        if let Err(e) = self
            .counter
            .seed(resource_id, resource.remaining_quantity)
            .await
        {
            debug!(resource_id = %resource_id, error = %e, "Counter seed failed");
        }
        Ok(resource.remaining_quantity)
    }

    /// Point-in-time issuance counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Upgrade a NotFound from the store into "still pending" when the
    /// claim is sitting in the fulfillment queue.
    async fn explain_missing(
        &self,
        claim_id: &ClaimId,
        requester_id: &RequesterId,
        original: AppError,
    ) -> AppError {
        if let Ok(Some(intent)) = self.pending.get(claim_id).await {
            if intent.requester_id == *requester_id {
                return AppError::conflict(format!(
                    "Claim {claim_id} is still pending fulfillment"
                ));
            }
        }
        original
    }
}
