//! PostgreSQL resource store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use claimgate_core::error::{AppError, ErrorKind};
use claimgate_core::result::AppResult;
use claimgate_core::types::{ClaimId, RequesterId, ResourceId};
use claimgate_entity::claim::{Claim, ClaimStatus};
use claimgate_entity::resource::Resource;

use super::{ClaimPersisted, ResourceStore};

/// PostgreSQL-backed resource store.
#[derive(Debug, Clone)]
pub struct PgResourceStore {
    pool: PgPool,
}

impl PgResourceStore {
    /// Create a new resource store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_claim(&self, claim_id: &ClaimId) -> AppResult<Option<Claim>> {
        sqlx::query_as::<_, Claim>("SELECT * FROM claims WHERE id = $1")
            .bind(*claim_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find claim", e))
    }

    /// Explain why the guarded cancel update matched zero rows.
    async fn cancel_rejection(&self, claim_id: &ClaimId, requester_id: &RequesterId) -> AppError {
        match self.find_claim(claim_id).await {
            Ok(Some(claim)) if claim.requester_id == *requester_id => match claim.status {
                ClaimStatus::Cancelled => AppError::already_cancelled(format!(
                    "Claim {claim_id} is already cancelled"
                )),
                _ => AppError::not_found(format!("Claim {claim_id} cannot be cancelled")),
            },
            Ok(_) => AppError::not_found(format!("Claim {claim_id} not found")),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl ResourceStore for PgResourceStore {
    async fn create(&self, resource: &Resource) -> AppResult<Resource> {
        sqlx::query_as::<_, Resource>(
            "INSERT INTO resources \
             (id, name, total_quantity, remaining_quantity, valid_from, valid_until, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(resource.id)
        .bind(&resource.name)
        .bind(resource.total_quantity)
        .bind(resource.remaining_quantity)
        .bind(resource.valid_from)
        .bind(resource.valid_until)
        .bind(resource.version)
        .bind(resource.created_at)
        .bind(resource.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create resource", e))
    }

    async fn find(&self, id: &ResourceId) -> AppResult<Option<Resource>> {
        sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE id = $1")
            .bind(*id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find resource", e))
    }

    async fn list(&self) -> AppResult<Vec<Resource>> {
        sqlx::query_as::<_, Resource>("SELECT * FROM resources ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list resources", e))
    }

    async fn issue_claim_locked(
        &self,
        resource_id: &ResourceId,
        requester_id: &RequesterId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Claim> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        // The row lock serializes every writer touching this resource,
        // so the admit check below cannot go stale before the insert.
        let resource =
            sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE id = $1 FOR UPDATE")
                .bind(*resource_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to lock resource", e)
                })?
                .ok_or_else(|| AppError::not_found(format!("Resource {resource_id} not found")))?;

        resource.admit(quantity, now)?;

        let claim = Claim::issue(ClaimId::new(), *resource_id, *requester_id, quantity, now);

        sqlx::query(
            "INSERT INTO claims (id, resource_id, requester_id, quantity, code, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(claim.id)
        .bind(claim.resource_id)
        .bind(claim.requester_id)
        .bind(claim.quantity)
        .bind(&claim.code)
        .bind(claim.status)
        .bind(claim.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert claim", e))?;

        sqlx::query(
            "UPDATE resources SET remaining_quantity = remaining_quantity - $2, \
             version = version + 1, updated_at = $3 WHERE id = $1",
        )
        .bind(*resource_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to deduct quantity", e))?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit claim issue", e)
        })?;

        Ok(claim)
    }

    async fn persist_claim(&self, claim: &Claim) -> AppResult<ClaimPersisted> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let inserted = sqlx::query(
            "INSERT INTO claims (id, resource_id, requester_id, quantity, code, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (id) DO NOTHING",
        )
        .bind(claim.id)
        .bind(claim.resource_id)
        .bind(claim.requester_id)
        .bind(claim.quantity)
        .bind(&claim.code)
        .bind(claim.status)
        .bind(claim.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to persist claim", e))?;

        if inserted.rows_affected() == 0 {
            return Ok(ClaimPersisted::Duplicate);
        }

        // Guarded deduction: if the row cannot cover the claim the whole
        // transaction rolls back, claim insert included.
        let resource = sqlx::query_as::<_, Resource>(
            "UPDATE resources SET remaining_quantity = remaining_quantity - $2, \
             version = version + 1, updated_at = $3 \
             WHERE id = $1 AND remaining_quantity >= $2 RETURNING *",
        )
        .bind(claim.resource_id)
        .bind(claim.quantity)
        .bind(claim.created_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to deduct quantity", e))?;

        match resource {
            Some(resource) => {
                tx.commit().await.map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to commit claim persist", e)
                })?;
                Ok(ClaimPersisted::Inserted(resource))
            }
            None => Err(AppError::exhausted(format!(
                "Resource {} cannot cover claim {}",
                claim.resource_id, claim.id
            ))),
        }
    }

    async fn cancel_claim(
        &self,
        claim_id: &ClaimId,
        requester_id: &RequesterId,
        now: DateTime<Utc>,
    ) -> AppResult<(Claim, Resource)> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let cancelled = sqlx::query_as::<_, Claim>(
            "UPDATE claims SET status = 'cancelled', cancelled_at = $3 \
             WHERE id = $1 AND requester_id = $2 AND status IN ('issued', 'used') RETURNING *",
        )
        .bind(*claim_id)
        .bind(*requester_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to cancel claim", e))?;

        let Some(claim) = cancelled else {
            return Err(self.cancel_rejection(claim_id, requester_id).await);
        };

        let resource = sqlx::query_as::<_, Resource>(
            "UPDATE resources SET remaining_quantity = remaining_quantity + $2, \
             version = version + 1, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(claim.resource_id)
        .bind(claim.quantity)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to restore quantity", e))?
        .ok_or_else(|| {
            AppError::not_found(format!("Resource {} not found", claim.resource_id))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit claim cancel", e)
        })?;

        Ok((claim, resource))
    }
}
