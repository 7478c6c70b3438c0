//! Ledger entry kind enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a ledger entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entry_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Balance granted to the requester (positive delta).
    Earned,
    /// Balance spent against an order (negative delta).
    Used,
    /// Reversal of an earlier entry (delta is the inverse of the original).
    Cancelled,
}

impl EntryKind {
    /// Check if entries of this kind may themselves be reversed.
    /// Reversal entries cannot be reversed again.
    pub fn is_reversible(&self) -> bool {
        matches!(self, Self::Earned | Self::Used)
    }

    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earned => "earned",
            Self::Used => "used",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = claimgate_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "earned" => Ok(Self::Earned),
            "used" => Ok(Self::Used),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(claimgate_core::AppError::validation(format!(
                "Invalid entry kind: '{s}'. Expected one of: earned, used, cancelled"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversibility() {
        assert!(EntryKind::Earned.is_reversible());
        assert!(EntryKind::Used.is_reversible());
        assert!(!EntryKind::Cancelled.is_reversible());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("earned".parse::<EntryKind>().unwrap(), EntryKind::Earned);
        assert_eq!("Used".parse::<EntryKind>().unwrap(), EntryKind::Used);
        assert!("refunded".parse::<EntryKind>().is_err());
    }
}
