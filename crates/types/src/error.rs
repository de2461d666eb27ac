//! Error types for the bundler

use alloy::primitives::U256;
use thiserror::Error;

/// Main error type for the bundler
#[derive(Error, Debug)]
pub enum BundlerError {
    /// Wire decoding errors
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Gas floor and other static validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The operation would revert on-chain
    #[error("{0}")]
    Simulation(String),

    /// Queue errors (duplicate admission, unknown hash)
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Ledger RPC errors
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Transaction signing errors
    #[error(transparent)]
    Signing(#[from] SignerError),
}

/// Result type alias for bundler operations
pub type Result<T> = std::result::Result<T, BundlerError>;

/// A wire field that could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field}: {message}")]
pub struct DecodeError {
    /// Wire name of the offending field
    pub field: &'static str,
    pub message: String,
}

impl DecodeError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Static validation errors raised before simulation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// preVerificationGas below the computed floor
    #[error("preVerificationGas too low: {provided} < {required}")]
    PreVerificationGasTooLow { provided: U256, required: U256 },
}

/// Operation queue errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// An operation with the same sender and nonce is already queued
    #[error("duplicate op: {key}")]
    Duplicate { key: String },

    /// No queued operation carries this hash
    #[error("op not found: {op_hash}")]
    NotFound { op_hash: String },
}

/// Ledger RPC errors
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    /// The call did not complete within the configured deadline
    #[error("ledger call {method} timed out")]
    Timeout { method: &'static str },

    /// Connection, HTTP or JSON-RPC failure
    #[error("ledger call {method} failed: {message}")]
    Transport { method: &'static str, message: String },

    /// Execution reverted; `data` holds the raw revert payload when the node returned one
    #[error("{message}")]
    Revert {
        message: String,
        data: Option<alloy::primitives::Bytes>,
    },

    /// The peer answered with something that could not be interpreted
    #[error("unexpected ledger response: {0}")]
    InvalidResponse(String),
}

/// Signer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// Private key material could not be parsed
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// Configured bundler address does not belong to the key
    #[error("bundler address {configured} does not match signer address {derived}")]
    AddressMismatch { configured: String, derived: String },

    /// Signing itself failed
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Configuration specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Parse error
    #[error("Configuration parse error: {0}")]
    ParseError(String),

    /// Validation error
    #[error("Configuration validation error: {field}: {message}")]
    ValidationError { field: String, message: String },
}

impl BundlerError {
    /// Whether the caller supplied a bad request (maps to JSON-RPC -32602)
    pub fn is_invalid_params(&self) -> bool {
        matches!(self, BundlerError::Decode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BundlerError::from(ValidationError::PreVerificationGasTooLow {
            provided: U256::from(41707),
            required: U256::from(41708),
        });
        assert_eq!(err.to_string(), "preVerificationGas too low: 41707 < 41708");

        let err = BundlerError::from(QueueError::Duplicate {
            key: "0xabc:1".to_string(),
        });
        assert_eq!(err.to_string(), "duplicate op: 0xabc:1");

        let err = BundlerError::from(DecodeError::new("gasFees", "expected 32 bytes, got 3"));
        assert_eq!(err.to_string(), "invalid gasFees: expected 32 bytes, got 3");
        assert!(err.is_invalid_params());
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::ParseError("missing field `contracts`".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration parse error: missing field `contracts`"
        );

        let err = ConfigError::ValidationError {
            field: "network.rpc_url".to_string(),
            message: "RPC URL must start with http://, https://, ws://, or wss://".to_string(),
        };
        assert!(err.to_string().contains("network.rpc_url"));
    }
}
