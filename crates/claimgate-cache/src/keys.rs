//! Cache and lock key builders for all ClaimGate entries.
//!
//! Centralising key construction prevents typos and makes it easy
//! to find every key the application uses.

use claimgate_core::types::{ClaimId, RequesterId, ResourceId};

/// Prefix applied to all ClaimGate keys.
const PREFIX: &str = "claimgate";

// ── Resource keys ──────────────────────────────────────────

/// Cache key for a resource snapshot by ID.
pub fn resource_snapshot(resource_id: &ResourceId) -> String {
    format!("{PREFIX}:resource:{resource_id}")
}

// ── Lock keys ──────────────────────────────────────────────

/// Lock key serializing issuance against a resource.
pub fn resource_lock(resource_id: &ResourceId) -> String {
    format!("{PREFIX}:lock:resource:{resource_id}")
}

/// Lock key serializing balance changes of a requester.
pub fn balance_lock(requester_id: &RequesterId) -> String {
    format!("{PREFIX}:lock:balance:{requester_id}")
}

// ── Pending claim keys ─────────────────────────────────────

/// Marker key for a claim admitted but not yet persisted.
pub fn pending_claim(claim_id: &ClaimId) -> String {
    format!("{PREFIX}:pending:{claim_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_resource_keys() {
        let id = ResourceId::from_uuid(Uuid::nil());
        assert_eq!(
            resource_snapshot(&id),
            "claimgate:resource:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            resource_lock(&id),
            "claimgate:lock:resource:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_pending_key() {
        let id = ClaimId::from_uuid(Uuid::nil());
        assert_eq!(
            pending_claim(&id),
            "claimgate:pending:00000000-0000-0000-0000-000000000000"
        );
    }
}
