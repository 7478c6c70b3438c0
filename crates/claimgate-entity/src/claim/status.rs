//! Claim status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle states of a claim.
///
/// `Pending` exists only for queue-decoupled issuance: the claim has been
/// admitted and acknowledged but not yet written to the database. Durable
/// rows are always inserted as `Issued` or later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "claim_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    /// Admitted, persistence still in flight.
    Pending,
    /// Issued and durable; may be used or cancelled.
    Issued,
    /// Redeemed against an order.
    Used,
    /// Cancelled; its quantity has been returned to the resource.
    Cancelled,
}

impl ClaimStatus {
    /// Check if the claim can be marked as used.
    pub fn can_use(&self) -> bool {
        matches!(self, Self::Issued)
    }

    /// Check if the claim can be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, Self::Issued | Self::Used)
    }

    /// Check if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Issued => "issued",
            Self::Used => "used",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = claimgate_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "issued" => Ok(Self::Issued),
            "used" => Ok(Self::Used),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(claimgate_core::AppError::validation(format!(
                "Invalid claim status: '{s}'. Expected one of: pending, issued, used, cancelled"
            ))),
        }
    }
}
