//! User operation validation and simulation
//!
//! This crate gates admission: it enforces the pre-verification gas floor,
//! simulates `handleOps` against the entry point and can fill in account
//! deployment code for senders that do not exist yet.

pub mod engine;
pub mod traits;
pub mod validation;

pub use engine::*;
pub use traits::*;
pub use validation::*;
