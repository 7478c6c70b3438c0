//! Balance and ledger entry models.

use chrono::{DateTime, Utc};
use claimgate_core::types::{EntryId, RequesterId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::kind::EntryKind;

/// A requester's current balance.
///
/// `version` backs optimistic concurrency: every write carries the version
/// it read, and a mismatched update affects zero rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Balance {
    /// The requester this balance belongs to.
    pub requester_id: RequesterId,
    /// Current balance. Never negative.
    pub amount: i64,
    /// Optimistic concurrency version, bumped on every write.
    pub version: i64,
    /// When the balance row was created.
    pub created_at: DateTime<Utc>,
    /// When the balance was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// Build a zero balance for a requester seen for the first time.
    pub fn new(requester_id: RequesterId, now: DateTime<Utc>) -> Self {
        Self {
            requester_id,
            amount: 0,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the balance covers a spend of `amount`.
    pub fn can_spend(&self, amount: i64) -> bool {
        self.amount >= amount
    }
}

/// One immutable row in a requester's balance history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    /// Unique entry identifier.
    pub id: EntryId,
    /// The requester whose balance this entry changed.
    pub requester_id: RequesterId,
    /// What the entry represents.
    pub kind: EntryKind,
    /// Signed delta applied to the balance.
    pub amount: i64,
    /// Balance immediately after this entry was applied.
    pub balance_after: i64,
    /// External order reference, if the change was tied to an order.
    pub order_ref: Option<String>,
    /// Set once the entry has been reversed by a cancellation.
    pub reversed: bool,
    /// For cancellation entries, the entry being reversed.
    pub reversal_of: Option<EntryId>,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Materialize a draft into a full row.
    pub fn from_new(new: NewEntry, balance_after: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: EntryId::new(),
            requester_id: new.requester_id,
            kind: new.kind,
            amount: new.amount,
            balance_after,
            order_ref: new.order_ref,
            reversed: false,
            reversal_of: new.reversal_of,
            created_at: now,
        }
    }

    /// The delta that undoes this entry.
    pub fn inverse_delta(&self) -> i64 {
        -self.amount
    }

    /// Check if this entry can still be reversed.
    pub fn can_reverse(&self) -> bool {
        self.kind.is_reversible() && !self.reversed
    }
}

/// Draft of a ledger entry; the store assigns id, balance and timestamp.
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// The requester whose balance changes.
    pub requester_id: RequesterId,
    /// What the entry represents.
    pub kind: EntryKind,
    /// Signed delta to apply.
    pub amount: i64,
    /// External order reference, if any.
    pub order_ref: Option<String>,
    /// For cancellation entries, the entry being reversed.
    pub reversal_of: Option<EntryId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_reverse() {
        let entry = LedgerEntry::from_new(
            NewEntry {
                requester_id: RequesterId::new(),
                kind: EntryKind::Used,
                amount: -30,
                order_ref: Some("order-1".into()),
                reversal_of: None,
            },
            70,
            Utc::now(),
        );
        assert!(entry.can_reverse());
        assert_eq!(entry.inverse_delta(), 30);

        let mut reversed = entry.clone();
        reversed.reversed = true;
        assert!(!reversed.can_reverse());
    }

    #[test]
    fn test_reversal_entries_are_final() {
        let entry = LedgerEntry::from_new(
            NewEntry {
                requester_id: RequesterId::new(),
                kind: EntryKind::Cancelled,
                amount: 30,
                order_ref: None,
                reversal_of: Some(EntryId::new()),
            },
            100,
            Utc::now(),
        );
        assert!(!entry.can_reverse());
    }

    #[test]
    fn test_balance_can_spend() {
        let mut balance = Balance::new(RequesterId::new(), Utc::now());
        assert!(!balance.can_spend(1));
        balance.amount = 50;
        assert!(balance.can_spend(50));
        assert!(!balance.can_spend(51));
    }
}
