//! Queued issuance intent message.

use chrono::{DateTime, Utc};
use claimgate_core::types::{ClaimId, RequesterId, ResourceId};
use claimgate_core::AppResult;
use serde::{Deserialize, Serialize};

/// The message enqueued when a claim is admitted under queue-decoupled
/// issuance. The fulfillment worker turns one of these into a durable
/// claim row; `claim_id` is the idempotency key for that write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimIntent {
    /// Claim id handed to the requester at admission time.
    pub claim_id: ClaimId,
    /// Resource the admission was granted against.
    pub resource_id: ResourceId,
    /// Requester the claim belongs to.
    pub requester_id: RequesterId,
    /// Admitted quantity, already deducted from the fast counter.
    pub quantity: i64,
    /// When the intent was enqueued.
    pub enqueued_at: DateTime<Utc>,
}

impl ClaimIntent {
    /// Serialize the intent for the broker.
    pub fn to_payload(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize an intent from a broker payload.
    pub fn from_payload(payload: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_roundtrip() {
        let intent = ClaimIntent {
            claim_id: ClaimId::new(),
            resource_id: ResourceId::new(),
            requester_id: RequesterId::new(),
            quantity: 1,
            enqueued_at: Utc::now(),
        };
        let payload = intent.to_payload().unwrap();
        let parsed = ClaimIntent::from_payload(&payload).unwrap();
        assert_eq!(intent, parsed);
    }
}
