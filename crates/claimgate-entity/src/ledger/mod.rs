//! Balance ledger domain entities.

pub mod kind;
pub mod model;

pub use kind::EntryKind;
pub use model::{Balance, LedgerEntry, NewEntry};
