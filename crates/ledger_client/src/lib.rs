//! Ledger client for talking to the chain's JSON-RPC node
//!
//! This crate defines the [`LedgerClient`] boundary used by the validator and
//! the bundling loop, an alloy-backed HTTP implementation that puts a deadline
//! on every call, and a startup/health probe.

pub mod client;
pub mod health;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use client::*;
pub use health::*;
