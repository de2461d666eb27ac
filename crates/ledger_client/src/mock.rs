//! In-memory ledger for tests

use crate::client::{CallRequest, LedgerClient, LedgerResult};
use alloy::primitives::{keccak256, Address, Bloom, Bytes, Log, B256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use types::{LedgerError, LedgerReceipt};

#[derive(Debug)]
struct MockState {
    chain_id: u64,
    gas_price: u128,
    nonces: HashMap<Address, u64>,
    latest_nonces: HashMap<Address, u64>,
    code: HashMap<Address, Bytes>,
    call_result: LedgerResult<Bytes>,
    send_error: Option<LedgerError>,
    unreachable: bool,
    receipts: HashMap<B256, LedgerReceipt>,
    auto_receipt_logs: Option<Vec<Log>>,
    calls: Vec<CallRequest>,
    sent: Vec<Bytes>,
    receipt_queries: usize,
}

/// Scriptable [`LedgerClient`] that records what it was asked
#[derive(Debug)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new(chain_id: u64) -> Self {
        Self {
            state: Mutex::new(MockState {
                chain_id,
                gas_price: 1_000_000_000,
                nonces: HashMap::new(),
                latest_nonces: HashMap::new(),
                code: HashMap::new(),
                call_result: Ok(Bytes::new()),
                send_error: None,
                unreachable: false,
                receipts: HashMap::new(),
                auto_receipt_logs: None,
                calls: Vec::new(),
                sent: Vec::new(),
                receipt_queries: 0,
            }),
        }
    }

    pub fn set_gas_price(&self, gas_price: u128) {
        self.state.lock().gas_price = gas_price;
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.state.lock().nonces.insert(address, nonce);
    }

    /// Nonce reported for the latest block, i.e. how many transactions have mined
    pub fn set_latest_nonce(&self, address: Address, nonce: u64) {
        self.state.lock().latest_nonces.insert(address, nonce);
    }

    pub fn set_code(&self, address: Address, code: Bytes) {
        self.state.lock().code.insert(address, code);
    }

    /// Result returned by every subsequent `eth_call`
    pub fn set_call_result(&self, result: LedgerResult<Bytes>) {
        self.state.lock().call_result = result;
    }

    pub fn fail_sends(&self, error: Option<LedgerError>) {
        self.state.lock().send_error = error;
    }

    /// Make every call fail as if the node were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Mine every sent transaction immediately with these logs
    pub fn mine_with_logs(&self, logs: Option<Vec<Log>>) {
        self.state.lock().auto_receipt_logs = logs;
    }

    pub fn insert_receipt(&self, receipt: LedgerReceipt) {
        self.state
            .lock()
            .receipts
            .insert(receipt.transaction_hash, receipt);
    }

    pub fn calls(&self) -> Vec<CallRequest> {
        self.state.lock().calls.clone()
    }

    pub fn sent_transactions(&self) -> Vec<Bytes> {
        self.state.lock().sent.clone()
    }

    pub fn receipt_queries(&self) -> usize {
        self.state.lock().receipt_queries
    }

    fn check_reachable(&self, method: &'static str) -> LedgerResult<()> {
        if self.state.lock().unreachable {
            return Err(LedgerError::Transport {
                method,
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

/// Receipt for `hash` carrying `logs`, mined in block 1
pub fn mined_receipt(hash: B256, logs: Vec<Log>) -> LedgerReceipt {
    LedgerReceipt {
        transaction_hash: hash,
        block_hash: Some(keccak256(hash)),
        block_number: Some(1),
        gas_used: 100_000,
        cumulative_gas_used: 100_000,
        effective_gas_price: 1_000_000_000,
        logs_bloom: Bloom::ZERO,
        status: true,
        logs,
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn chain_id(&self) -> LedgerResult<u64> {
        self.check_reachable("eth_chainId")?;
        Ok(self.state.lock().chain_id)
    }

    async fn call(&self, request: &CallRequest) -> LedgerResult<Bytes> {
        self.check_reachable("eth_call")?;
        let mut state = self.state.lock();
        state.calls.push(request.clone());
        state.call_result.clone()
    }

    async fn code_at(&self, address: Address) -> LedgerResult<Bytes> {
        self.check_reachable("eth_getCode")?;
        Ok(self.state.lock().code.get(&address).cloned().unwrap_or_default())
    }

    async fn pending_nonce(&self, address: Address) -> LedgerResult<u64> {
        self.check_reachable("eth_getTransactionCount")?;
        Ok(self.state.lock().nonces.get(&address).copied().unwrap_or_default())
    }

    async fn latest_nonce(&self, address: Address) -> LedgerResult<u64> {
        self.check_reachable("eth_getTransactionCount")?;
        Ok(self
            .state
            .lock()
            .latest_nonces
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn gas_price(&self) -> LedgerResult<u128> {
        self.check_reachable("eth_gasPrice")?;
        Ok(self.state.lock().gas_price)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> LedgerResult<B256> {
        self.check_reachable("eth_sendRawTransaction")?;
        let mut state = self.state.lock();
        if let Some(err) = state.send_error.clone() {
            return Err(err);
        }

        let hash = keccak256(raw);
        state.sent.push(Bytes::copy_from_slice(raw));
        if let Some(logs) = state.auto_receipt_logs.clone() {
            state.receipts.insert(hash, mined_receipt(hash, logs));
        }
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: B256) -> LedgerResult<Option<LedgerReceipt>> {
        self.check_reachable("eth_getTransactionReceipt")?;
        let mut state = self.state.lock();
        state.receipt_queries += 1;
        Ok(state.receipts.get(&hash).cloned())
    }
}
