//! # claimgate-broker
//!
//! Partitioned, key-ordered transport for claim intents.
//!
//! Queue-decoupled issuance publishes an intent after the fast admission
//! gate passes and lets a background worker make it durable. The broker
//! guarantees:
//!
//! - **Per-key ordering**: intents for one resource always land on the same
//!   partition and are consumed oldest-first.
//! - **At-least-once delivery**: a consumed message stays in a working set
//!   until acked, requeued, or dead-lettered, and is recovered on startup
//!   if its consumer died mid-flight.
//!
//! Backends: Redis lists (multi-node) and in-memory queues (tests and
//! single-node deployments).

pub mod memory;
pub mod provider;
#[cfg(feature = "redis-broker")]
pub mod redis;

pub use memory::MemoryBroker;
pub use provider::BrokerManager;
#[cfg(feature = "redis-broker")]
pub use redis::RedisBroker;
