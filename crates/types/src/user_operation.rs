//! User operation types and wire decoding

use crate::entry_point::PackedUserOperation;
use crate::error::DecodeError;
use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identifier of a user operation as computed by the caller (`getUserOpHash`)
pub type UserOperationHash = B256;

/// A decoded ERC-4337 v0.7 user operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// The account making the operation
    pub sender: Address,
    /// Anti-replay parameter, chosen by the caller
    pub nonce: U256,
    /// Factory address followed by factory call data, or empty
    pub init_code: Bytes,
    /// Data passed to the sender during execution
    pub call_data: Bytes,
    /// verificationGasLimit (16 bytes) followed by callGasLimit (16 bytes)
    pub account_gas_limits: B256,
    /// Gas paid to the bundler for pre-verification work
    pub pre_verification_gas: U256,
    /// maxPriorityFeePerGas (16 bytes) followed by maxFeePerGas (16 bytes)
    pub gas_fees: B256,
    /// Paymaster address and data, or empty
    pub paymaster_and_data: Bytes,
    /// Data the sender uses to verify authorization
    pub signature: Bytes,
}

/// User operation as it arrives over the wire: every field is a `0x` hex string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPackedUserOperation {
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub init_code: String,
    #[serde(default)]
    pub call_data: String,
    #[serde(default)]
    pub account_gas_limits: String,
    #[serde(default)]
    pub pre_verification_gas: String,
    #[serde(default)]
    pub gas_fees: String,
    #[serde(default)]
    pub paymaster_and_data: String,
    #[serde(default)]
    pub signature: String,
}

impl UserOperation {
    /// Admission key: `sender:nonce`, checksummed address and decimal nonce
    pub fn admission_key(&self) -> String {
        admission_key(&self.sender, &self.nonce)
    }

    /// Verification gas limit (high half of `accountGasLimits`)
    pub fn verification_gas_limit(&self) -> u128 {
        unpack_u128_pair(&self.account_gas_limits).0
    }

    /// Call gas limit (low half of `accountGasLimits`)
    pub fn call_gas_limit(&self) -> u128 {
        unpack_u128_pair(&self.account_gas_limits).1
    }

    /// Max priority fee per gas (high half of `gasFees`)
    pub fn max_priority_fee_per_gas(&self) -> u128 {
        unpack_u128_pair(&self.gas_fees).0
    }

    /// Max fee per gas (low half of `gasFees`)
    pub fn max_fee_per_gas(&self) -> u128 {
        unpack_u128_pair(&self.gas_fees).1
    }

    /// Whether the operation carries account deployment instructions
    pub fn has_init_code(&self) -> bool {
        !self.init_code.is_empty()
    }
}

/// Build the admission key for a sender and nonce
pub fn admission_key(sender: &Address, nonce: &U256) -> String {
    format!("{}:{}", sender, nonce)
}

/// Pack two 16-byte values into one 32-byte word, `high` first
pub fn pack_u128_pair(high: u128, low: u128) -> B256 {
    let mut word = [0u8; 32];
    word[..16].copy_from_slice(&high.to_be_bytes());
    word[16..].copy_from_slice(&low.to_be_bytes());
    B256::from(word)
}

/// Split a 32-byte word into its two 16-byte halves, `(high, low)`
pub fn unpack_u128_pair(word: &B256) -> (u128, u128) {
    let mut high = [0u8; 16];
    let mut low = [0u8; 16];
    high.copy_from_slice(&word[..16]);
    low.copy_from_slice(&word[16..]);
    (u128::from_be_bytes(high), u128::from_be_bytes(low))
}

impl From<&UserOperation> for PackedUserOperation {
    fn from(op: &UserOperation) -> Self {
        PackedUserOperation {
            sender: op.sender,
            nonce: op.nonce,
            initCode: op.init_code.clone(),
            callData: op.call_data.clone(),
            accountGasLimits: op.account_gas_limits,
            preVerificationGas: op.pre_verification_gas,
            gasFees: op.gas_fees,
            paymasterAndData: op.paymaster_and_data.clone(),
            signature: op.signature.clone(),
        }
    }
}

impl RawPackedUserOperation {
    /// Decode every hex field into a [`UserOperation`].
    ///
    /// The first field that fails to decode is named in the returned error.
    /// `accountGasLimits` and `gasFees` must be exactly 32 bytes; shorter or
    /// longer input is rejected rather than padded or truncated.
    pub fn decode(&self) -> Result<UserOperation, DecodeError> {
        let sender = Address::from_str(self.sender.trim())
            .map_err(|e| DecodeError::new("sender", e.to_string()))?;

        Ok(UserOperation {
            sender,
            nonce: decode_quantity("nonce", &self.nonce)?,
            init_code: decode_bytes("initCode", &self.init_code)?,
            call_data: decode_bytes("callData", &self.call_data)?,
            account_gas_limits: decode_bytes32("accountGasLimits", &self.account_gas_limits)?,
            pre_verification_gas: decode_quantity("preVerificationGas", &self.pre_verification_gas)?,
            gas_fees: decode_bytes32("gasFees", &self.gas_fees)?,
            paymaster_and_data: decode_bytes("paymasterAndData", &self.paymaster_and_data)?,
            signature: decode_bytes("signature", &self.signature)?,
        })
    }
}

impl From<&UserOperation> for RawPackedUserOperation {
    fn from(op: &UserOperation) -> Self {
        Self {
            sender: op.sender.to_string(),
            nonce: format!("{:#x}", op.nonce),
            init_code: op.init_code.to_string(),
            call_data: op.call_data.to_string(),
            account_gas_limits: op.account_gas_limits.to_string(),
            pre_verification_gas: format!("{:#x}", op.pre_verification_gas),
            gas_fees: op.gas_fees.to_string(),
            paymaster_and_data: op.paymaster_and_data.to_string(),
            signature: op.signature.to_string(),
        }
    }
}

fn strip_hex_prefix(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

fn decode_quantity(field: &'static str, value: &str) -> Result<U256, DecodeError> {
    let digits = strip_hex_prefix(value);
    if digits.is_empty() {
        return Err(DecodeError::new(field, format!("empty quantity: {:?}", value)));
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| DecodeError::new(field, format!("{}: {}", value, e)))
}

fn decode_bytes(field: &'static str, value: &str) -> Result<Bytes, DecodeError> {
    alloy::hex::decode(strip_hex_prefix(value))
        .map(Bytes::from)
        .map_err(|e| DecodeError::new(field, e.to_string()))
}

fn decode_bytes32(field: &'static str, value: &str) -> Result<B256, DecodeError> {
    let bytes = alloy::hex::decode(strip_hex_prefix(value))
        .map_err(|e| DecodeError::new(field, e.to_string()))?;
    if bytes.len() != 32 {
        return Err(DecodeError::new(
            field,
            format!("expected 32 bytes, got {}", bytes.len()),
        ));
    }
    Ok(B256::from_slice(&bytes))
}
