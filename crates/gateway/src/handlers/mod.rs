//! Route handlers.
//!
//! - [`public`]: challenge issuance and the challenge-for-token exchange
//! - [`private`]: resources behind the access gate
//! - [`health`]: liveness of the durable store

pub mod health;
pub mod private;
pub mod public;
