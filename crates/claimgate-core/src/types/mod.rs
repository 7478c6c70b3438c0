//! Shared type definitions.

pub mod id;

pub use id::{ClaimId, EntryId, RequesterId, ResourceId};
