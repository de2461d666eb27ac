//! Entry point contract bindings (ERC-4337 v0.7 packed user operations)

use alloy::sol;

sol! {
    /// Packed user operation as consumed by `handleOps`
    #[derive(Debug, Default, PartialEq, Eq)]
    struct PackedUserOperation {
        address sender;
        uint256 nonce;
        bytes initCode;
        bytes callData;
        bytes32 accountGasLimits;
        uint256 preVerificationGas;
        bytes32 gasFees;
        bytes paymasterAndData;
        bytes signature;
    }

    /// Subset of the entry point used by the bundler
    interface IEntryPoint {
        /// Emitted once per executed user operation
        #[derive(Debug, PartialEq, Eq)]
        event UserOperationEvent(
            bytes32 indexed userOpHash,
            address indexed sender,
            address indexed paymaster,
            uint256 nonce,
            bool success,
            uint256 actualGasCost,
            uint256 actualGasUsed
        );

        #[derive(Debug, PartialEq, Eq)]
        error FailedOp(uint256 opIndex, string reason);

        #[derive(Debug, PartialEq, Eq)]
        error FailedOpWithRevert(uint256 opIndex, string reason, bytes inner);

        function handleOps(PackedUserOperation[] calldata ops, address payable beneficiary) external;
    }

    /// Account factory used to deploy senders that have no code yet
    interface IAccountFactory {
        function createAccount(address owner, uint256 salt) external returns (address);
    }
}

use crate::user_operation::UserOperation;
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;

/// ABI-encode `handleOps(ops, beneficiary)`, selector included
pub fn encode_handle_ops(ops: &[UserOperation], beneficiary: Address) -> Bytes {
    let call = IEntryPoint::handleOpsCall {
        ops: ops.iter().map(PackedUserOperation::from).collect(),
        beneficiary,
    };
    Bytes::from(call.abi_encode())
}

/// `initCode` deploying `owner`'s account through `factory` with salt 0
pub fn account_init_code(factory: Address, owner: Address) -> Bytes {
    let call = IAccountFactory::createAccountCall {
        owner,
        salt: U256::ZERO,
    };
    let mut init_code = factory.to_vec();
    init_code.extend_from_slice(&call.abi_encode());
    Bytes::from(init_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_op() -> UserOperation {
        UserOperation {
            sender: Address::repeat_byte(0x11),
            nonce: U256::ZERO,
            init_code: Bytes::new(),
            call_data: Bytes::new(),
            account_gas_limits: Default::default(),
            pre_verification_gas: U256::ZERO,
            gas_fees: Default::default(),
            paymaster_and_data: Bytes::new(),
            signature: Bytes::new(),
        }
    }

    #[test]
    fn test_handle_ops_encoding_length() {
        let encoded = encode_handle_ops(&[empty_op()], Address::repeat_byte(0x22));
        assert_eq!(&encoded[..4], &IEntryPoint::handleOpsCall::SELECTOR);
        // selector + 2 head words + array length + element offset + 9 tuple words + 4 empty tails
        assert_eq!(encoded.len(), 4 + 32 * (2 + 1 + 1 + 9 + 4));

        let decoded = IEntryPoint::handleOpsCall::abi_decode(&encoded, true).unwrap();
        assert_eq!(decoded.ops.len(), 1);
        assert_eq!(decoded.beneficiary, Address::repeat_byte(0x22));
    }

    #[test]
    fn test_account_init_code_layout() {
        let factory = Address::repeat_byte(0xfa);
        let owner = Address::repeat_byte(0x0e);
        let init_code = account_init_code(factory, owner);

        assert_eq!(&init_code[..20], factory.as_slice());
        assert_eq!(&init_code[20..24], &IAccountFactory::createAccountCall::SELECTOR);
        assert_eq!(init_code.len(), 20 + 4 + 64);
    }
}
