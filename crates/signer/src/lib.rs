//! Bundle transaction signing
//!
//! Holds the bundler's private key and turns unsigned bundle transactions
//! into replay-protected signed envelopes ready for `eth_sendRawTransaction`.

pub mod forger;

pub use forger::*;
