//! # claimgate-coordination
//!
//! Cross-process coordination primitives for ClaimGate:
//!
//! - **Distributed lock**: advisory, lease-based, owner-checked release.
//!   Serializes check-then-act sequences per resource or per requester.
//! - **Quantity counter**: atomic remaining-quantity gate, seeded from the
//!   durable record and rebuilt from it on drift.
//!
//! Both come in a Redis flavour (multi-node) and an in-memory flavour
//! (tests and single-node deployments), selected by configuration.

pub mod counter;
pub mod lock;

pub use counter::CounterManager;
pub use lock::LockManager;
