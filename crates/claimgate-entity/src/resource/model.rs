//! Resource entity model.

use chrono::{DateTime, Utc};
use claimgate_core::types::ResourceId;
use claimgate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A limited-quantity resource that claims are issued against.
///
/// The database row is the source of truth for `remaining_quantity`;
/// cache and counter entries derived from it are accelerators only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Resource {
    /// Unique resource identifier.
    pub id: ResourceId,
    /// Human-readable resource name.
    pub name: String,
    /// Total quantity available over the resource's lifetime.
    pub total_quantity: i64,
    /// Quantity still available for new claims.
    pub remaining_quantity: i64,
    /// Claims are admitted from this instant (inclusive).
    pub valid_from: DateTime<Utc>,
    /// Claims are rejected from this instant (exclusive).
    pub valid_until: DateTime<Utc>,
    /// Bumped on every quantity change.
    pub version: i64,
    /// When the resource was created.
    pub created_at: DateTime<Utc>,
    /// When the resource was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    /// Build a new resource row from creation input, validating the
    /// quantity and validity window.
    pub fn new(input: CreateResource, now: DateTime<Utc>) -> AppResult<Self> {
        if input.name.trim().is_empty() {
            return Err(AppError::validation("Resource name must not be empty"));
        }
        if input.total_quantity <= 0 {
            return Err(AppError::validation(format!(
                "Total quantity must be positive, got {}",
                input.total_quantity
            )));
        }
        if input.valid_from >= input.valid_until {
            return Err(AppError::validation(
                "Resource validity window must start before it ends",
            ));
        }
        Ok(Self {
            id: ResourceId::new(),
            name: input.name,
            total_quantity: input.total_quantity,
            remaining_quantity: input.total_quantity,
            valid_from: input.valid_from,
            valid_until: input.valid_until,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// Check if `now` falls inside the validity window.
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now < self.valid_until
    }

    /// Check if no quantity remains.
    pub fn is_exhausted(&self) -> bool {
        self.remaining_quantity <= 0
    }

    /// Reject with the reason when `now` falls outside the window.
    pub fn check_window(&self, now: DateTime<Utc>) -> AppResult<()> {
        if now < self.valid_from {
            return Err(AppError::out_of_window(format!(
                "Resource '{}' is not yet claimable (opens at {})",
                self.name, self.valid_from
            )));
        }
        if now >= self.valid_until {
            return Err(AppError::out_of_window(format!(
                "Resource '{}' is no longer claimable (closed at {})",
                self.name, self.valid_until
            )));
        }
        Ok(())
    }

    /// Decide whether a claim for `quantity` units can be admitted at
    /// `now`. Window rejection takes precedence over exhaustion.
    pub fn admit(&self, quantity: i64, now: DateTime<Utc>) -> AppResult<()> {
        if quantity <= 0 {
            return Err(AppError::validation(format!(
                "Claim quantity must be positive, got {quantity}"
            )));
        }
        self.check_window(now)?;
        if self.remaining_quantity < quantity {
            return Err(AppError::exhausted(format!(
                "Resource '{}' has {} remaining, requested {}",
                self.name, self.remaining_quantity, quantity
            )));
        }
        Ok(())
    }

    /// Deduct an issued claim's quantity. Caller must have admitted first.
    pub fn apply_claim(&mut self, quantity: i64, now: DateTime<Utc>) {
        self.remaining_quantity -= quantity;
        self.version += 1;
        self.updated_at = now;
    }

    /// Return a cancelled claim's quantity to the pool.
    pub fn restore_quantity(&mut self, quantity: i64, now: DateTime<Utc>) {
        self.remaining_quantity += quantity;
        self.version += 1;
        self.updated_at = now;
    }
}

/// Data required to create a new resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResource {
    /// Human-readable resource name.
    pub name: String,
    /// Total claimable quantity.
    pub total_quantity: i64,
    /// Window start (inclusive).
    pub valid_from: DateTime<Utc>,
    /// Window end (exclusive).
    pub valid_until: DateTime<Utc>,
}
