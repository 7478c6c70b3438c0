//! Background processing for ClaimGate.
//!
//! This crate provides:
//! - A fulfillment handler that persists claim intents consumed from the broker
//! - A runner that drives one consumer per broker partition
//! - A reconciler that trues the fast-path quantity counters up against the database
//! - A cron scheduler for the periodic reconciliation pass

pub mod fulfillment;
pub mod reconcile;
pub mod runner;
pub mod scheduler;

pub use fulfillment::{FulfillmentError, FulfillmentHandler};
pub use reconcile::CounterReconciler;
pub use runner::FulfillmentRunner;
pub use scheduler::CronScheduler;
