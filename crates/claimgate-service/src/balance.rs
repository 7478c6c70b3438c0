//! Balance and ledger operations.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use claimgate_cache::keys;
use claimgate_coordination::LockManager;
use claimgate_core::config::issuance::BalanceConfig;
use claimgate_core::error::{AppError, ErrorKind};
use claimgate_core::traits::lock::DistributedLock;
use claimgate_core::types::{EntryId, RequesterId};
use claimgate_database::stores::BalanceStore;
use claimgate_entity::ledger::{Balance, EntryKind, LedgerEntry, NewEntry};

use crate::issue::release_quietly;

/// Handles requester balances and their ledgers.
///
/// Every change runs under the per-requester lock and an optimistic
/// version check; the lock keeps contention off the version check, the
/// version check keeps correctness off the lock.
#[derive(Debug, Clone)]
pub struct BalanceService {
    /// Balance store.
    balances: Arc<dyn BalanceStore>,
    /// Distributed lock provider.
    lock: LockManager,
    /// Maximum time to wait for the per-requester lock.
    lock_wait: Duration,
    /// Per-requester lock lease.
    lock_lease: Duration,
    /// Version-conflict retry budget.
    save_retries: u32,
}

impl BalanceService {
    /// Creates a new balance service.
    pub fn new(balances: Arc<dyn BalanceStore>, lock: LockManager, config: &BalanceConfig) -> Self {
        Self {
            balances,
            lock,
            lock_wait: Duration::from_secs(config.lock_wait_seconds),
            lock_lease: Duration::from_secs(config.lock_lease_seconds),
            save_retries: config.save_retries,
        }
    }

    /// A requester's balance, created at zero on first sight.
    pub async fn current(&self, requester_id: &RequesterId) -> Result<Balance, AppError> {
        self.balances.get_or_create(requester_id, Utc::now()).await
    }

    /// Add earned amount to a balance.
    pub async fn earn(
        &self,
        requester_id: &RequesterId,
        amount: i64,
        order_ref: Option<String>,
    ) -> Result<(Balance, LedgerEntry), AppError> {
        Self::check_amount(amount)?;
        self.apply_locked(requester_id, EntryKind::Earned, amount, order_ref)
            .await
    }

    /// Spend from a balance. Fails with `InsufficientBalance` when the
    /// balance does not cover the amount.
    pub async fn spend(
        &self,
        requester_id: &RequesterId,
        amount: i64,
        order_ref: Option<String>,
    ) -> Result<(Balance, LedgerEntry), AppError> {
        Self::check_amount(amount)?;
        self.apply_locked(requester_id, EntryKind::Used, -amount, order_ref)
            .await
    }

    /// Reverse a ledger entry exactly once, undoing its balance effect.
    pub async fn reverse(
        &self,
        requester_id: &RequesterId,
        entry_id: &EntryId,
    ) -> Result<(LedgerEntry, Balance), AppError> {
        let guard = self
            .lock
            .acquire(
                &keys::balance_lock(requester_id),
                self.lock_wait,
                self.lock_lease,
            )
            .await?;
        let outcome = self
            .balances
            .reverse_entry(entry_id, requester_id, Utc::now())
            .await;
        release_quietly(&self.lock, &guard).await;

        let (entry, balance) = outcome?;
        info!(
            requester_id = %requester_id,
            entry_id = %entry_id,
            balance = balance.amount,
            "Ledger entry reversed"
        );
        Ok((entry, balance))
    }

    /// A requester's most recent ledger entries, newest first.
    pub async fn history(
        &self,
        requester_id: &RequesterId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        let limit = limit.clamp(1, 200);
        self.balances.history(requester_id, limit).await
    }

    fn check_amount(amount: i64) -> Result<(), AppError> {
        if amount <= 0 {
            return Err(AppError::validation(format!(
                "Amount must be positive, got {amount}"
            )));
        }
        Ok(())
    }

    async fn apply_locked(
        &self,
        requester_id: &RequesterId,
        kind: EntryKind,
        delta: i64,
        order_ref: Option<String>,
    ) -> Result<(Balance, LedgerEntry), AppError> {
        let guard = self
            .lock
            .acquire(
                &keys::balance_lock(requester_id),
                self.lock_wait,
                self.lock_lease,
            )
            .await?;
        let outcome = self
            .apply_with_retries(requester_id, kind, delta, order_ref)
            .await;
        release_quietly(&self.lock, &guard).await;
        outcome
    }

    async fn apply_with_retries(
        &self,
        requester_id: &RequesterId,
        kind: EntryKind,
        delta: i64,
        order_ref: Option<String>,
    ) -> Result<(Balance, LedgerEntry), AppError> {
        let mut attempt = 0u32;
        loop {
            let balance = self.balances.get_or_create(requester_id, Utc::now()).await?;
            let new_amount = balance.amount + delta;
            if new_amount < 0 {
                return Err(AppError::insufficient_balance(format!(
                    "Balance {} cannot cover {}",
                    balance.amount, -delta
                )));
            }

            let entry = NewEntry {
                requester_id: *requester_id,
                kind,
                amount: delta,
                order_ref: order_ref.clone(),
                reversal_of: None,
            };
            match self
                .balances
                .apply(balance.version, new_amount, entry, Utc::now())
                .await
            {
                Ok(pair) => {
                    info!(
                        requester_id = %requester_id,
                        kind = %kind,
                        delta,
                        balance = pair.0.amount,
                        "Balance updated"
                    );
                    return Ok(pair);
                }
                Err(e) if e.kind == ErrorKind::Conflict && attempt < self.save_retries => {
                    attempt += 1;
                    debug!(
                        requester_id = %requester_id,
                        attempt,
                        "Balance version conflict, reloading"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}
