//! Claim domain entities.

pub mod intent;
pub mod model;
pub mod status;

pub use intent::ClaimIntent;
pub use model::Claim;
pub use status::ClaimStatus;
