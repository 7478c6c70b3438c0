//! # claimgate-core
//!
//! Core crate for ClaimGate. Contains traits, configuration schemas,
//! typed identifiers, the retry helper, and the unified error system.
//!
//! This crate has **no** internal dependencies on other ClaimGate crates.

pub mod config;
pub mod error;
pub mod result;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
