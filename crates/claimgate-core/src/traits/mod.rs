//! Core traits defined in `claimgate-core` and implemented by other crates.

pub mod broker;
pub mod cache;
pub mod counter;
pub mod lock;

pub use broker::{Delivery, IntentBroker};
pub use cache::CacheProvider;
pub use counter::QuantityCounter;
pub use lock::{DistributedLock, LockGuard};
