//! Durable store traits.
//!
//! Services hold these as `Arc<dyn ...>` so that the PostgreSQL
//! implementations and the in-memory test double are interchangeable.
//! Every multi-row operation is transactional in both.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use claimgate_core::result::AppResult;
use claimgate_core::types::{ClaimId, EntryId, RequesterId, ResourceId};
use claimgate_entity::claim::Claim;
use claimgate_entity::ledger::{Balance, LedgerEntry, NewEntry};
use claimgate_entity::resource::Resource;

pub mod balance;
pub mod claim;
pub mod resource;

pub use balance::PgBalanceStore;
pub use claim::PgClaimStore;
pub use resource::PgResourceStore;

/// Outcome of persisting an admitted claim.
#[derive(Debug, Clone)]
pub enum ClaimPersisted {
    /// The claim row was inserted and the quantity deducted. Carries the
    /// updated resource row so callers can refresh derived state.
    Inserted(Resource),
    /// A row with this claim id already existed; nothing was changed.
    Duplicate,
}

/// Durable operations on resources and claim issuance against them.
#[async_trait]
pub trait ResourceStore: Send + Sync + std::fmt::Debug {
    /// Insert a new resource row.
    async fn create(&self, resource: &Resource) -> AppResult<Resource>;

    /// Find a resource by id.
    async fn find(&self, id: &ResourceId) -> AppResult<Option<Resource>>;

    /// List all resources, newest first.
    async fn list(&self) -> AppResult<Vec<Resource>>;

    /// Issue a claim under a row lock: lock the resource, re-check the
    /// validity window and remaining quantity, insert the claim row and
    /// deduct the quantity, all in one transaction. The row lock
    /// serializes concurrent issuers so the check and the insert cannot
    /// interleave.
    async fn issue_claim_locked(
        &self,
        resource_id: &ResourceId,
        requester_id: &RequesterId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Claim>;

    /// Persist a claim that was already admitted by the fast path. The
    /// insert is idempotent on the claim id; the quantity deduction is
    /// guarded so the row can never go negative. Returns `Exhausted`
    /// when the guard fails, leaving nothing written.
    async fn persist_claim(&self, claim: &Claim) -> AppResult<ClaimPersisted>;

    /// Cancel a claim and return its quantity to the resource, in one
    /// transaction. Only issued or used claims can be cancelled, and
    /// only by their owner.
    async fn cancel_claim(
        &self,
        claim_id: &ClaimId,
        requester_id: &RequesterId,
        now: DateTime<Utc>,
    ) -> AppResult<(Claim, Resource)>;
}

/// Durable read and redemption operations on claims.
#[async_trait]
pub trait ClaimStore: Send + Sync + std::fmt::Debug {
    /// Find a claim by id.
    async fn find(&self, id: &ClaimId) -> AppResult<Option<Claim>>;

    /// List a requester's claims, newest first.
    async fn list_for_requester(&self, requester_id: &RequesterId) -> AppResult<Vec<Claim>>;

    /// Mark an issued claim as used, recording the order reference.
    /// Fails with `AlreadyUsed` or `AlreadyCancelled` when the claim has
    /// left the issued state, and `NotFound` when it does not exist or
    /// belongs to another requester.
    async fn mark_used(
        &self,
        id: &ClaimId,
        requester_id: &RequesterId,
        order_ref: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Claim>;
}

/// Durable operations on requester balances and their ledgers.
#[async_trait]
pub trait BalanceStore: Send + Sync + std::fmt::Debug {
    /// Find a balance by requester.
    async fn find(&self, requester_id: &RequesterId) -> AppResult<Option<Balance>>;

    /// Fetch a requester's balance, creating a zero row on first sight.
    async fn get_or_create(
        &self,
        requester_id: &RequesterId,
        now: DateTime<Utc>,
    ) -> AppResult<Balance>;

    /// Write a new balance amount together with the ledger entry that
    /// explains it, atomically. The update carries the version the
    /// caller read; a mismatch means another writer won and surfaces as
    /// `Conflict`.
    async fn apply(
        &self,
        expected_version: i64,
        new_amount: i64,
        entry: NewEntry,
        now: DateTime<Utc>,
    ) -> AppResult<(Balance, LedgerEntry)>;

    /// Reverse a ledger entry exactly once: flip its `reversed` flag,
    /// apply the inverse delta to the balance, and append a cancellation
    /// entry linking back to it. A second reversal fails with
    /// `AlreadyCancelled`; a reversal that would drive the balance
    /// negative fails with `InsufficientBalance` and writes nothing.
    async fn reverse_entry(
        &self,
        entry_id: &EntryId,
        requester_id: &RequesterId,
        now: DateTime<Utc>,
    ) -> AppResult<(LedgerEntry, Balance)>;

    /// Find a single ledger entry by id.
    async fn entry(&self, entry_id: &EntryId) -> AppResult<Option<LedgerEntry>>;

    /// A requester's most recent ledger entries, newest first.
    async fn history(&self, requester_id: &RequesterId, limit: i64) -> AppResult<Vec<LedgerEntry>>;
}
