//! PostgreSQL balance store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use claimgate_core::error::{AppError, ErrorKind};
use claimgate_core::result::AppResult;
use claimgate_core::types::{EntryId, RequesterId};
use claimgate_entity::ledger::{Balance, EntryKind, LedgerEntry, NewEntry};

use super::BalanceStore;

/// PostgreSQL-backed balance store.
#[derive(Debug, Clone)]
pub struct PgBalanceStore {
    pool: PgPool,
}

impl PgBalanceStore {
    /// Create a new balance store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_entry(
        entry: &LedgerEntry,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO ledger_entries \
             (id, requester_id, kind, amount, balance_after, order_ref, reversed, reversal_of, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(entry.id)
        .bind(entry.requester_id)
        .bind(entry.kind)
        .bind(entry.amount)
        .bind(entry.balance_after)
        .bind(&entry.order_ref)
        .bind(entry.reversed)
        .bind(entry.reversal_of)
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to insert ledger entry", e)
        })?;
        Ok(())
    }
}

#[async_trait]
impl BalanceStore for PgBalanceStore {
    async fn find(&self, requester_id: &RequesterId) -> AppResult<Option<Balance>> {
        sqlx::query_as::<_, Balance>("SELECT * FROM balances WHERE requester_id = $1")
            .bind(*requester_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find balance", e))
    }

    async fn get_or_create(
        &self,
        requester_id: &RequesterId,
        now: DateTime<Utc>,
    ) -> AppResult<Balance> {
        let created = sqlx::query_as::<_, Balance>(
            "INSERT INTO balances (requester_id, amount, version, created_at, updated_at) \
             VALUES ($1, 0, 1, $2, $2) ON CONFLICT (requester_id) DO NOTHING RETURNING *",
        )
        .bind(*requester_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create balance", e))?;

        if let Some(balance) = created {
            return Ok(balance);
        }
        self.find(requester_id).await?.ok_or_else(|| {
            AppError::internal(format!("Balance for {requester_id} vanished after upsert"))
        })
    }

    async fn apply(
        &self,
        expected_version: i64,
        new_amount: i64,
        entry: NewEntry,
        now: DateTime<Utc>,
    ) -> AppResult<(Balance, LedgerEntry)> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let balance = sqlx::query_as::<_, Balance>(
            "UPDATE balances SET amount = $2, version = version + 1, updated_at = $3 \
             WHERE requester_id = $1 AND version = $4 RETURNING *",
        )
        .bind(entry.requester_id)
        .bind(new_amount)
        .bind(now)
        .bind(expected_version)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update balance", e))?
        .ok_or_else(|| {
            AppError::conflict(format!(
                "Balance for {} changed concurrently (expected version {})",
                entry.requester_id, expected_version
            ))
        })?;

        let ledger_entry = LedgerEntry::from_new(entry, balance.amount, now);
        Self::insert_entry(&ledger_entry, &mut tx).await?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit balance change", e)
        })?;

        Ok((balance, ledger_entry))
    }

    async fn reverse_entry(
        &self,
        entry_id: &EntryId,
        requester_id: &RequesterId,
        now: DateTime<Utc>,
    ) -> AppResult<(LedgerEntry, Balance)> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let entry = sqlx::query_as::<_, LedgerEntry>(
            "SELECT * FROM ledger_entries WHERE id = $1 FOR UPDATE",
        )
        .bind(*entry_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock ledger entry", e))?
        .filter(|entry| entry.requester_id == *requester_id)
        .ok_or_else(|| AppError::not_found(format!("Ledger entry {entry_id} not found")))?;

        if entry.reversed {
            return Err(AppError::already_cancelled(format!(
                "Ledger entry {entry_id} was already reversed"
            )));
        }
        if !entry.kind.is_reversible() {
            return Err(AppError::validation(format!(
                "Ledger entry {entry_id} is a reversal and cannot be reversed"
            )));
        }

        let delta = entry.inverse_delta();
        let balance = sqlx::query_as::<_, Balance>(
            "UPDATE balances SET amount = amount + $2, version = version + 1, updated_at = $3 \
             WHERE requester_id = $1 AND amount + $2 >= 0 RETURNING *",
        )
        .bind(*requester_id)
        .bind(delta)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reverse balance", e))?
        .ok_or_else(|| {
            AppError::insufficient_balance(format!(
                "Reversing entry {entry_id} would drive the balance negative"
            ))
        })?;

        sqlx::query("UPDATE ledger_entries SET reversed = TRUE WHERE id = $1")
            .bind(*entry_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to flag entry reversed", e)
            })?;

        let cancel_entry = LedgerEntry::from_new(
            NewEntry {
                requester_id: *requester_id,
                kind: EntryKind::Cancelled,
                amount: delta,
                order_ref: entry.order_ref.clone(),
                reversal_of: Some(entry.id),
            },
            balance.amount,
            now,
        );
        Self::insert_entry(&cancel_entry, &mut tx).await?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit reversal", e)
        })?;

        Ok((cancel_entry, balance))
    }

    async fn entry(&self, entry_id: &EntryId) -> AppResult<Option<LedgerEntry>> {
        sqlx::query_as::<_, LedgerEntry>("SELECT * FROM ledger_entries WHERE id = $1")
            .bind(*entry_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find ledger entry", e)
            })
    }

    async fn history(
        &self,
        requester_id: &RequesterId,
        limit: i64,
    ) -> AppResult<Vec<LedgerEntry>> {
        sqlx::query_as::<_, LedgerEntry>(
            "SELECT * FROM ledger_entries WHERE requester_id = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(*requester_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load ledger history", e))
    }
}
