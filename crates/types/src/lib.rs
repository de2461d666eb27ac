//! Shared types for the bundler
//!
//! This crate contains the domain types shared by the bundler components:
//! user operations and their wire form, receipts, JSON-RPC envelopes, the
//! entry point ABI and the error taxonomy.

pub mod entry_point;
pub mod error;
pub mod receipt;
pub mod rpc;
pub mod user_operation;
pub mod utils;

// Re-export commonly used types
pub use entry_point::{
    account_init_code, encode_handle_ops, IAccountFactory, IEntryPoint, PackedUserOperation,
};
pub use error::{
    BundlerError, ConfigError, DecodeError, LedgerError, QueueError, Result, SignerError,
    ValidationError,
};
pub use receipt::{LedgerReceipt, OperationState, TxReceipt, UserOperationReceipt};
pub use user_operation::{
    admission_key, pack_u128_pair, unpack_u128_pair, RawPackedUserOperation, UserOperation,
    UserOperationHash,
};
