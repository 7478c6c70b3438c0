//! PostgreSQL claim store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use claimgate_core::error::{AppError, ErrorKind};
use claimgate_core::result::AppResult;
use claimgate_core::types::{ClaimId, RequesterId};
use claimgate_entity::claim::{Claim, ClaimStatus};

use super::ClaimStore;

/// PostgreSQL-backed claim store.
#[derive(Debug, Clone)]
pub struct PgClaimStore {
    pool: PgPool,
}

impl PgClaimStore {
    /// Create a new claim store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClaimStore for PgClaimStore {
    async fn find(&self, id: &ClaimId) -> AppResult<Option<Claim>> {
        sqlx::query_as::<_, Claim>("SELECT * FROM claims WHERE id = $1")
            .bind(*id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find claim", e))
    }

    async fn list_for_requester(&self, requester_id: &RequesterId) -> AppResult<Vec<Claim>> {
        sqlx::query_as::<_, Claim>(
            "SELECT * FROM claims WHERE requester_id = $1 ORDER BY created_at DESC",
        )
        .bind(*requester_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list claims", e))
    }

    async fn mark_used(
        &self,
        id: &ClaimId,
        requester_id: &RequesterId,
        order_ref: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Claim> {
        // The status predicate makes the transition atomic; losers of a
        // concurrent race match zero rows and fall into the diagnosis.
        let updated = sqlx::query_as::<_, Claim>(
            "UPDATE claims SET status = 'used', order_ref = $3, used_at = $4 \
             WHERE id = $1 AND requester_id = $2 AND status = 'issued' RETURNING *",
        )
        .bind(*id)
        .bind(*requester_id)
        .bind(order_ref)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark claim used", e))?;

        if let Some(claim) = updated {
            return Ok(claim);
        }

        match self.find(id).await? {
            Some(claim) if claim.requester_id == *requester_id => match claim.status {
                ClaimStatus::Used => Err(AppError::already_used(format!(
                    "Claim {id} was already used"
                ))),
                ClaimStatus::Cancelled => Err(AppError::already_cancelled(format!(
                    "Claim {id} is cancelled"
                ))),
                _ => Err(AppError::not_found(format!("Claim {id} is not usable"))),
            },
            _ => Err(AppError::not_found(format!("Claim {id} not found"))),
        }
    }
}
