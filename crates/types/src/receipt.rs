//! Ledger receipts and per-operation execution receipts

use crate::entry_point::IEntryPoint::UserOperationEvent;
use alloy::primitives::{Address, Bloom, Log, B256, U256, U64};
use alloy::sol_types::SolEvent;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a queued operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    /// Admitted, not yet part of a submitted transaction
    Pending,
    /// Included in a transaction the bundler submitted
    Bundled,
    /// Confirmed by a matching `UserOperationEvent`
    Sent,
}

impl OperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Pending => "pending",
            OperationState::Bundled => "bundled",
            OperationState::Sent => "sent",
        }
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction receipt as returned by the ledger, independent of the RPC transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReceipt {
    pub transaction_hash: B256,
    pub block_hash: Option<B256>,
    pub block_number: Option<u64>,
    pub gas_used: u128,
    pub cumulative_gas_used: u128,
    pub effective_gas_price: u128,
    pub logs_bloom: Bloom,
    /// Execution status of the outer transaction
    pub status: bool,
    pub logs: Vec<Log>,
}

/// Outcome of decoding one entry-point log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedUserOperationEvent {
    /// Index of the log inside the receipt
    pub log_index: usize,
    pub event: UserOperationEvent,
}

impl LedgerReceipt {
    /// Decode every `UserOperationEvent` emitted by `entry_point`.
    ///
    /// Logs from other contracts or with a different first topic are ignored.
    /// Logs that carry the event signature but do not match its shape are
    /// returned as errors alongside their index so the caller can report them.
    pub fn user_operation_events(
        &self,
        entry_point: Address,
    ) -> Vec<Result<DecodedUserOperationEvent, (usize, String)>> {
        self.logs
            .iter()
            .enumerate()
            .filter(|(_, log)| {
                log.address == entry_point
                    && log.data.topics().first() == Some(&UserOperationEvent::SIGNATURE_HASH)
            })
            .map(|(log_index, log)| {
                UserOperationEvent::decode_log_data(&log.data, true)
                    .map(|event| DecodedUserOperationEvent { log_index, event })
                    .map_err(|e| (log_index, e.to_string()))
            })
            .collect()
    }
}

/// Ledger transaction section of a user operation receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_hash: Option<B256>,
    pub block_number: Option<U64>,
    pub logs_bloom: Bloom,
    pub gas_used: U256,
    pub cumulative_gas_used: U256,
    pub effective_gas_price: U256,
    pub status: U64,
}

impl From<&LedgerReceipt> for TxReceipt {
    fn from(receipt: &LedgerReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            block_hash: receipt.block_hash,
            block_number: receipt.block_number.map(U64::from),
            logs_bloom: receipt.logs_bloom,
            gas_used: U256::from(receipt.gas_used),
            cumulative_gas_used: U256::from(receipt.cumulative_gas_used),
            effective_gas_price: U256::from(receipt.effective_gas_price),
            status: U64::from(receipt.status as u8),
        }
    }
}

/// Per-operation receipt assembled from a confirmed `UserOperationEvent`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    pub user_op_hash: B256,
    pub sender: Address,
    pub nonce: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    pub success: bool,
    pub actual_gas_cost: U256,
    pub actual_gas_used: U256,
    pub receipt: TxReceipt,
}

impl UserOperationReceipt {
    /// Combine a decoded event with the receipt of the transaction that emitted it
    pub fn from_event(event: &UserOperationEvent, receipt: &LedgerReceipt) -> Self {
        Self {
            user_op_hash: event.userOpHash,
            sender: event.sender,
            nonce: event.nonce,
            paymaster: (!event.paymaster.is_zero()).then_some(event.paymaster),
            success: event.success,
            actual_gas_cost: event.actualGasCost,
            actual_gas_used: event.actualGasUsed,
            receipt: TxReceipt::from(receipt),
        }
    }
}
