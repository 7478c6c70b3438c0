//! Synchronous row-locked issuance.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use claimgate_cache::ResourceSnapshotCache;
use claimgate_core::error::AppError;
use claimgate_core::types::{RequesterId, ResourceId};
use claimgate_database::stores::ResourceStore;

use super::{ClaimTicket, Issuer};

/// Issues claims in a single row-locked database transaction. The
/// simplest strategy; every attempt for one resource serializes on its
/// row.
#[derive(Debug, Clone)]
pub struct DirectIssuer {
    resources: Arc<dyn ResourceStore>,
    snapshots: ResourceSnapshotCache,
}

impl DirectIssuer {
    /// Creates a new direct issuer.
    pub fn new(resources: Arc<dyn ResourceStore>, snapshots: ResourceSnapshotCache) -> Self {
        Self {
            resources,
            snapshots,
        }
    }
}

#[async_trait]
impl Issuer for DirectIssuer {
    async fn issue(
        &self,
        resource_id: &ResourceId,
        requester_id: &RequesterId,
        quantity: i64,
    ) -> Result<ClaimTicket, AppError> {
        let claim = self
            .resources
            .issue_claim_locked(resource_id, requester_id, quantity, Utc::now())
            .await?;

        // The row changed under us; the next reader reloads.
        if let Err(e) = self.snapshots.invalidate(resource_id).await {
            debug!(resource_id = %resource_id, error = %e, "Snapshot invalidation failed");
        }

        info!(
            claim_id = %claim.id,
            resource_id = %resource_id,
            requester_id = %requester_id,
            quantity,
            "Claim issued (direct)"
        );
        Ok(ClaimTicket::issued(&claim))
    }
}
