//! In-memory store implementation.
//!
//! Implements every durable store trait over plain hash maps for tests
//! and single-node development. One mutex guards all tables, so each
//! operation is a serializable transaction with the same observable
//! semantics as the PostgreSQL stores.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use claimgate_core::error::AppError;
use claimgate_core::result::AppResult;
use claimgate_core::types::{ClaimId, EntryId, RequesterId, ResourceId};
use claimgate_entity::claim::{Claim, ClaimStatus};
use claimgate_entity::ledger::{Balance, EntryKind, LedgerEntry, NewEntry};
use claimgate_entity::resource::Resource;

use crate::stores::{BalanceStore, ClaimPersisted, ClaimStore, ResourceStore};

#[derive(Debug, Default)]
struct Tables {
    resources: HashMap<ResourceId, Resource>,
    claims: HashMap<ClaimId, Claim>,
    balances: HashMap<RequesterId, Balance>,
    entries: Vec<LedgerEntry>,
}

/// In-memory implementation of all durable stores.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn create(&self, resource: &Resource) -> AppResult<Resource> {
        let mut tables = self.tables.lock().await;
        tables.resources.insert(resource.id, resource.clone());
        Ok(resource.clone())
    }

    async fn find(&self, id: &ResourceId) -> AppResult<Option<Resource>> {
        let tables = self.tables.lock().await;
        Ok(tables.resources.get(id).cloned())
    }

    async fn list(&self) -> AppResult<Vec<Resource>> {
        let tables = self.tables.lock().await;
        let mut resources: Vec<Resource> = tables.resources.values().cloned().collect();
        resources.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(resources)
    }

    async fn issue_claim_locked(
        &self,
        resource_id: &ResourceId,
        requester_id: &RequesterId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Claim> {
        let mut tables = self.tables.lock().await;
        let resource = tables
            .resources
            .get_mut(resource_id)
            .ok_or_else(|| AppError::not_found(format!("Resource {resource_id} not found")))?;

        resource.admit(quantity, now)?;
        resource.apply_claim(quantity, now);

        let claim = Claim::issue(ClaimId::new(), *resource_id, *requester_id, quantity, now);
        tables.claims.insert(claim.id, claim.clone());
        Ok(claim)
    }

    async fn persist_claim(&self, claim: &Claim) -> AppResult<ClaimPersisted> {
        let mut tables = self.tables.lock().await;
        if tables.claims.contains_key(&claim.id) {
            return Ok(ClaimPersisted::Duplicate);
        }

        let resource = tables
            .resources
            .get_mut(&claim.resource_id)
            .ok_or_else(|| {
                AppError::not_found(format!("Resource {} not found", claim.resource_id))
            })?;
        if resource.remaining_quantity < claim.quantity {
            return Err(AppError::exhausted(format!(
                "Resource {} cannot cover claim {}",
                claim.resource_id, claim.id
            )));
        }

        resource.apply_claim(claim.quantity, claim.created_at);
        let snapshot = resource.clone();
        tables.claims.insert(claim.id, claim.clone());
        Ok(ClaimPersisted::Inserted(snapshot))
    }

    async fn cancel_claim(
        &self,
        claim_id: &ClaimId,
        requester_id: &RequesterId,
        now: DateTime<Utc>,
    ) -> AppResult<(Claim, Resource)> {
        let mut tables = self.tables.lock().await;

        let claim = tables
            .claims
            .get(claim_id)
            .filter(|claim| claim.requester_id == *requester_id)
            .ok_or_else(|| AppError::not_found(format!("Claim {claim_id} not found")))?;

        match claim.status {
            ClaimStatus::Cancelled => {
                return Err(AppError::already_cancelled(format!(
                    "Claim {claim_id} is already cancelled"
                )));
            }
            ClaimStatus::Issued | ClaimStatus::Used => {}
            _ => {
                return Err(AppError::not_found(format!(
                    "Claim {claim_id} cannot be cancelled"
                )));
            }
        }

        let (resource_id, quantity) = (claim.resource_id, claim.quantity);
        let resource = tables
            .resources
            .get_mut(&resource_id)
            .ok_or_else(|| AppError::not_found(format!("Resource {resource_id} not found")))?;
        resource.restore_quantity(quantity, now);
        let resource_snapshot = resource.clone();

        let claim = tables
            .claims
            .get_mut(claim_id)
            .ok_or_else(|| AppError::not_found(format!("Claim {claim_id} not found")))?;
        claim.status = ClaimStatus::Cancelled;
        claim.cancelled_at = Some(now);

        Ok((claim.clone(), resource_snapshot))
    }
}

#[async_trait]
impl ClaimStore for MemoryStore {
    async fn find(&self, id: &ClaimId) -> AppResult<Option<Claim>> {
        let tables = self.tables.lock().await;
        Ok(tables.claims.get(id).cloned())
    }

    async fn list_for_requester(&self, requester_id: &RequesterId) -> AppResult<Vec<Claim>> {
        let tables = self.tables.lock().await;
        let mut claims: Vec<Claim> = tables
            .claims
            .values()
            .filter(|claim| claim.requester_id == *requester_id)
            .cloned()
            .collect();
        claims.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(claims)
    }

    async fn mark_used(
        &self,
        id: &ClaimId,
        requester_id: &RequesterId,
        order_ref: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Claim> {
        let mut tables = self.tables.lock().await;
        let claim = tables
            .claims
            .get_mut(id)
            .filter(|claim| claim.requester_id == *requester_id)
            .ok_or_else(|| AppError::not_found(format!("Claim {id} not found")))?;

        match claim.status {
            ClaimStatus::Issued => {
                claim.status = ClaimStatus::Used;
                claim.order_ref = Some(order_ref.to_string());
                claim.used_at = Some(now);
                Ok(claim.clone())
            }
            ClaimStatus::Used => Err(AppError::already_used(format!(
                "Claim {id} was already used"
            ))),
            ClaimStatus::Cancelled => Err(AppError::already_cancelled(format!(
                "Claim {id} is cancelled"
            ))),
            ClaimStatus::Pending => Err(AppError::not_found(format!("Claim {id} is not usable"))),
        }
    }
}

#[async_trait]
impl BalanceStore for MemoryStore {
    async fn find(&self, requester_id: &RequesterId) -> AppResult<Option<Balance>> {
        let tables = self.tables.lock().await;
        Ok(tables.balances.get(requester_id).cloned())
    }

    async fn get_or_create(
        &self,
        requester_id: &RequesterId,
        now: DateTime<Utc>,
    ) -> AppResult<Balance> {
        let mut tables = self.tables.lock().await;
        let balance = tables
            .balances
            .entry(*requester_id)
            .or_insert_with(|| Balance::new(*requester_id, now));
        Ok(balance.clone())
    }

    async fn apply(
        &self,
        expected_version: i64,
        new_amount: i64,
        entry: NewEntry,
        now: DateTime<Utc>,
    ) -> AppResult<(Balance, LedgerEntry)> {
        let mut tables = self.tables.lock().await;
        let balance = match tables.balances.get_mut(&entry.requester_id) {
            Some(balance) if balance.version == expected_version => balance,
            _ => {
                return Err(AppError::conflict(format!(
                    "Balance for {} changed concurrently (expected version {})",
                    entry.requester_id, expected_version
                )));
            }
        };

        balance.amount = new_amount;
        balance.version += 1;
        balance.updated_at = now;
        let balance_snapshot = balance.clone();

        let ledger_entry = LedgerEntry::from_new(entry, new_amount, now);
        tables.entries.push(ledger_entry.clone());
        Ok((balance_snapshot, ledger_entry))
    }

    async fn reverse_entry(
        &self,
        entry_id: &EntryId,
        requester_id: &RequesterId,
        now: DateTime<Utc>,
    ) -> AppResult<(LedgerEntry, Balance)> {
        let mut tables = self.tables.lock().await;

        let idx = tables
            .entries
            .iter()
            .position(|entry| entry.id == *entry_id && entry.requester_id == *requester_id)
            .ok_or_else(|| AppError::not_found(format!("Ledger entry {entry_id} not found")))?;

        if tables.entries[idx].reversed {
            return Err(AppError::already_cancelled(format!(
                "Ledger entry {entry_id} was already reversed"
            )));
        }
        if !tables.entries[idx].kind.is_reversible() {
            return Err(AppError::validation(format!(
                "Ledger entry {entry_id} is a reversal and cannot be reversed"
            )));
        }

        let delta = tables.entries[idx].inverse_delta();
        let order_ref = tables.entries[idx].order_ref.clone();

        let balance = tables
            .balances
            .get_mut(requester_id)
            .ok_or_else(|| AppError::not_found(format!("Balance for {requester_id} not found")))?;
        if balance.amount + delta < 0 {
            return Err(AppError::insufficient_balance(format!(
                "Reversing entry {entry_id} would drive the balance negative"
            )));
        }

        balance.amount += delta;
        balance.version += 1;
        balance.updated_at = now;
        let balance_snapshot = balance.clone();

        tables.entries[idx].reversed = true;
        let cancel_entry = LedgerEntry::from_new(
            NewEntry {
                requester_id: *requester_id,
                kind: EntryKind::Cancelled,
                amount: delta,
                order_ref,
                reversal_of: Some(*entry_id),
            },
            balance_snapshot.amount,
            now,
        );
        tables.entries.push(cancel_entry.clone());
        Ok((cancel_entry, balance_snapshot))
    }

    async fn entry(&self, entry_id: &EntryId) -> AppResult<Option<LedgerEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .entries
            .iter()
            .find(|entry| entry.id == *entry_id)
            .cloned())
    }

    async fn history(
        &self,
        requester_id: &RequesterId,
        limit: i64,
    ) -> AppResult<Vec<LedgerEntry>> {
        let tables = self.tables.lock().await;
        let mut entries: Vec<LedgerEntry> = tables
            .entries
            .iter()
            .filter(|entry| entry.requester_id == *requester_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }
}
