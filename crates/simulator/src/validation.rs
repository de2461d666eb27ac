//! Pre-verification gas floor

use alloy::primitives::{Address, U256};
use types::{encode_handle_ops, UserOperation, ValidationError};

/// Overheads used to price the calldata and fixed cost of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasOverheads {
    /// Intrinsic cost of the bundle transaction
    pub fixed: u64,
    pub per_user_op: u64,
    /// Cost per 32-byte word of `handleOps` calldata
    pub per_word: u64,
    /// Number of operations sharing the fixed cost
    pub expected_bundle_size: u64,
    pub transaction_stipend: u64,
}

impl Default for GasOverheads {
    fn default() -> Self {
        Self {
            fixed: 21_000,
            per_user_op: 18_300,
            per_word: 6,
            expected_bundle_size: 1,
            transaction_stipend: 2_300,
        }
    }
}

impl GasOverheads {
    /// Minimum `preVerificationGas` for `op` submitted alone with `beneficiary`
    pub fn min_pre_verification_gas(&self, op: &UserOperation, beneficiary: Address) -> U256 {
        let calldata_len = encode_handle_ops(std::slice::from_ref(op), beneficiary).len() as u64;
        let words = calldata_len.div_ceil(32);
        let bundle_size = self.expected_bundle_size.max(1);

        let overhead = self.per_user_op
            + words * self.per_word
            + self.fixed / bundle_size
            + self.transaction_stipend / bundle_size;
        U256::from(overhead)
    }

    /// Reject `op` if its `preVerificationGas` is below the floor
    pub fn validate(&self, op: &UserOperation, beneficiary: Address) -> Result<(), ValidationError> {
        let required = self.min_pre_verification_gas(op, beneficiary);
        if op.pre_verification_gas < required {
            return Err(ValidationError::PreVerificationGasTooLow {
                provided: op.pre_verification_gas,
                required,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Bytes;

    fn op_with_pvg(pre_verification_gas: u64) -> UserOperation {
        UserOperation {
            sender: Address::repeat_byte(0x11),
            nonce: U256::ZERO,
            init_code: Bytes::new(),
            call_data: Bytes::new(),
            account_gas_limits: Default::default(),
            pre_verification_gas: U256::from(pre_verification_gas),
            gas_fees: Default::default(),
            paymaster_and_data: Bytes::new(),
            signature: Bytes::new(),
        }
    }

    #[test]
    fn test_floor_for_empty_operation() {
        // 548 bytes of calldata, 18 words
        let floor = GasOverheads::default().min_pre_verification_gas(&op_with_pvg(0), Address::ZERO);
        assert_eq!(floor, U256::from(18_300 + 18 * 6 + 21_000 + 2_300));
        assert_eq!(floor, U256::from(41_708));
    }

    #[test]
    fn test_one_below_floor_rejected() {
        let overheads = GasOverheads::default();
        let err = overheads.validate(&op_with_pvg(41_707), Address::ZERO).unwrap_err();
        assert_eq!(
            err,
            ValidationError::PreVerificationGasTooLow {
                provided: U256::from(41_707),
                required: U256::from(41_708),
            }
        );
        assert_eq!(err.to_string(), "preVerificationGas too low: 41707 < 41708");

        assert!(overheads.validate(&op_with_pvg(41_708), Address::ZERO).is_ok());
    }

    #[test]
    fn test_floor_grows_with_calldata() {
        let overheads = GasOverheads::default();
        let mut op = op_with_pvg(0);
        let base = overheads.min_pre_verification_gas(&op, Address::ZERO);

        // 33 bytes: one length word plus two data words
        op.call_data = Bytes::from(vec![0xab; 33]);
        let grown = overheads.min_pre_verification_gas(&op, Address::ZERO);
        assert_eq!(grown, base + U256::from(2 * 6));
    }

    #[test]
    fn test_validation_is_monotonic_in_pre_verification_gas() {
        let overheads = GasOverheads::default();
        let mut accepted = false;
        for pvg in (41_000..42_500).step_by(50) {
            let ok = overheads.validate(&op_with_pvg(pvg), Address::ZERO).is_ok();
            assert!(!(accepted && !ok), "rejected {} after accepting a lower value", pvg);
            accepted |= ok;
        }
        assert!(accepted);
    }
}
