//! # claimgate-service
//!
//! Business logic service layer for ClaimGate. Each service orchestrates
//! durable stores, caches, coordination primitives, and the intent broker
//! to implement application-level use cases.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references or cheap clones.

pub mod balance;
pub mod claims;
pub mod issue;
pub mod metrics;
pub mod resource;

pub use balance::BalanceService;
pub use claims::ClaimService;
pub use issue::{ClaimTicket, DirectIssuer, Issuer, LockedIssuer, QueuedIssuer, build_issuer};
pub use metrics::{IssueMetrics, MetricsSnapshot};
pub use resource::ResourceService;
