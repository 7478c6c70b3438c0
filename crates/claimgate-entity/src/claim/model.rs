//! Claim entity model.

use chrono::{DateTime, Utc};
use claimgate_core::types::{ClaimId, RequesterId, ResourceId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::intent::ClaimIntent;
use super::status::ClaimStatus;

/// A claim held by a requester against a resource.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Claim {
    /// Unique claim identifier.
    pub id: ClaimId,
    /// The resource this claim was issued against.
    pub resource_id: ResourceId,
    /// The requester holding the claim.
    pub requester_id: RequesterId,
    /// Units of the resource this claim covers.
    pub quantity: i64,
    /// Short human-readable redemption code, derived from the claim id.
    pub code: String,
    /// Current lifecycle state.
    pub status: ClaimStatus,
    /// Order reference recorded when the claim was used.
    pub order_ref: Option<String>,
    /// When the claim was issued.
    pub created_at: DateTime<Utc>,
    /// When the claim was used, if it has been.
    pub used_at: Option<DateTime<Utc>>,
    /// When the claim was cancelled, if it has been.
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Claim {
    /// Build an issued claim row. The id is minted by the caller so that
    /// queue-decoupled issuance can hand it out before the row exists.
    pub fn issue(
        id: ClaimId,
        resource_id: ResourceId,
        requester_id: RequesterId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            code: Self::short_code(&id),
            id,
            resource_id,
            requester_id,
            quantity,
            status: ClaimStatus::Issued,
            order_ref: None,
            created_at: now,
            used_at: None,
            cancelled_at: None,
        }
    }

    /// View of a claim that was admitted but is not durable yet. Built
    /// from the pending marker for status lookups.
    pub fn pending(intent: &ClaimIntent) -> Self {
        Self {
            id: intent.claim_id,
            resource_id: intent.resource_id,
            requester_id: intent.requester_id,
            quantity: intent.quantity,
            code: Self::short_code(&intent.claim_id),
            status: ClaimStatus::Pending,
            order_ref: None,
            created_at: intent.enqueued_at,
            used_at: None,
            cancelled_at: None,
        }
    }

    /// Derive the 12-character uppercase redemption code from a claim id.
    /// The mapping is deterministic so retried persistence produces the
    /// same code.
    pub fn short_code(id: &ClaimId) -> String {
        let hex = id.as_uuid().simple().to_string().to_uppercase();
        hex[..12].to_string()
    }

    /// Check if the claim can be marked as used.
    pub fn can_use(&self) -> bool {
        self.status.can_use()
    }

    /// Check if the claim can be cancelled.
    pub fn can_cancel(&self) -> bool {
        self.status.can_cancel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_defaults() {
        let claim = Claim::issue(
            ClaimId::new(),
            ResourceId::new(),
            RequesterId::new(),
            2,
            Utc::now(),
        );
        assert_eq!(claim.status, ClaimStatus::Issued);
        assert!(claim.can_use());
        assert!(claim.can_cancel());
        assert!(claim.order_ref.is_none());
    }

    #[test]
    fn test_short_code_shape() {
        let id = ClaimId::new();
        let code = Claim::short_code(&id);
        assert_eq!(code.len(), 12);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_eq!(code, Claim::short_code(&id));
    }
}
