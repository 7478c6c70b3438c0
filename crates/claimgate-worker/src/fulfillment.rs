//! Fulfillment of queued claim intents.
//!
//! Delivery from the broker is at-least-once, so persistence must be
//! idempotent: the claim id minted at admission is the idempotency key,
//! and a redelivered intent whose row already exists is treated as done.

use std::sync::Arc;

use chrono::Utc;
use tracing;

use claimgate_cache::{PendingClaimCache, ResourceSnapshotCache};
use claimgate_core::error::{AppError, ErrorKind};
use claimgate_database::stores::{ClaimPersisted, ResourceStore};
use claimgate_entity::claim::{Claim, ClaimIntent};

/// Error from fulfilling one intent
#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    /// Permanent failure, do not retry
    #[error("Permanent fulfillment failure: {0}")]
    Permanent(String),

    /// Transient failure, may retry
    #[error("Transient fulfillment failure: {0}")]
    Transient(String),
}

/// Persists admitted claim intents as durable claim rows
#[derive(Debug)]
pub struct FulfillmentHandler {
    /// Resource store for the guarded claim insert
    resources: Arc<dyn ResourceStore>,
    /// Markers for admitted-but-not-durable claims
    pending: PendingClaimCache,
    /// Snapshot cache refreshed after each fulfilled claim
    snapshots: ResourceSnapshotCache,
}

impl FulfillmentHandler {
    /// Create a new fulfillment handler
    pub fn new(
        resources: Arc<dyn ResourceStore>,
        pending: PendingClaimCache,
        snapshots: ResourceSnapshotCache,
    ) -> Self {
        Self {
            resources,
            pending,
            snapshots,
        }
    }

    /// Fulfill one broker payload: decode the intent and persist the claim
    pub async fn fulfill(&self, payload: &str) -> Result<(), FulfillmentError> {
        let intent = ClaimIntent::from_payload(payload).map_err(|e| {
            FulfillmentError::Permanent(format!("Undecodable intent payload: {}", e))
        })?;

        let claim = Claim::issue(
            intent.claim_id,
            intent.resource_id,
            intent.requester_id,
            intent.quantity,
            Utc::now(),
        );

        match self.resources.persist_claim(&claim).await {
            Ok(ClaimPersisted::Inserted(resource)) => {
                self.clear_marker(&intent).await;
                if let Err(e) = self.snapshots.put(&resource).await {
                    tracing::debug!("Failed to refresh snapshot after fulfillment: {}", e);
                }
                tracing::info!(
                    "Claim {} fulfilled: {} unit(s) of resource {} for requester {}",
                    claim.id,
                    claim.quantity,
                    claim.resource_id,
                    claim.requester_id
                );
                Ok(())
            }
            Ok(ClaimPersisted::Duplicate) => {
                // Redelivery of an intent that already landed.
                tracing::debug!("Claim {} already persisted, redelivery ignored", claim.id);
                self.clear_marker(&intent).await;
                Ok(())
            }
            Err(e) => Err(self.classify(&intent, e).await),
        }
    }

    /// Map a persistence error to a retry decision
    async fn classify(&self, intent: &ClaimIntent, err: AppError) -> FulfillmentError {
        match err.kind {
            // The admission counter said yes but the durable row said no.
            // The counter stays low until the reconciler trues it up, so a
            // retry cannot succeed and the intent is poison.
            ErrorKind::Exhausted => {
                tracing::error!(
                    "Claim {} rejected by the durable quantity guard: {}",
                    intent.claim_id,
                    err
                );
                self.clear_marker(intent).await;
                FulfillmentError::Permanent(err.to_string())
            }
            ErrorKind::Validation | ErrorKind::NotFound => {
                self.clear_marker(intent).await;
                FulfillmentError::Permanent(err.to_string())
            }
            // Everything else gets another delivery; the runner bounds the
            // attempts.
            _ => FulfillmentError::Transient(err.to_string()),
        }
    }

    /// Drop the pending marker so status probes stop reporting the claim
    /// as in flight
    async fn clear_marker(&self, intent: &ClaimIntent) {
        if let Err(e) = self.pending.clear(&intent.claim_id).await {
            tracing::debug!(
                "Failed to clear pending marker for claim {}: {}",
                intent.claim_id,
                e
            );
        }
    }
}
