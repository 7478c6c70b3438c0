//! # claimgate-cache
//!
//! Cache provider implementations for ClaimGate. Supports two modes:
//!
//! - **memory**: In-process cache using [moka](https://crates.io/crates/moka)
//! - **redis**: Redis-backed cache using the [redis](https://crates.io/crates/redis) crate
//!
//! The provider is selected at runtime based on configuration. On top of
//! the raw providers, this crate builds the read-through resource snapshot
//! cache and the pending-claim markers used by queue-decoupled issuance.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;
pub mod snapshot;

pub use provider::CacheManager;
pub use snapshot::{PendingClaimCache, ResourceSnapshotCache};
