//! # claimgate-database
//!
//! Durable store traits plus their PostgreSQL and in-memory
//! implementations. The database is the source of truth for every
//! quantity in the system; counters and caches are rebuilt from it.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod stores;

pub use connection::DatabasePool;
pub use memory::MemoryStore;
pub use stores::{BalanceStore, ClaimPersisted, ClaimStore, ResourceStore};
