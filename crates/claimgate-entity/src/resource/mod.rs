//! Claimable resource entities.

pub mod model;

pub use model::{CreateResource, Resource};
