//! Ledger client trait and alloy HTTP implementation

use alloy::eips::BlockId;
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockNumberOrTag, TransactionInput, TransactionReceipt, TransactionRequest};
use alloy::transports::http::{Client, Http};
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use types::{LedgerError, LedgerReceipt};

/// Result type for ledger calls
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Read-only call against a contract, as the bundler would send it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub gas: u64,
}

/// The ledger RPC peer used by the validator and the bundling loop
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// `eth_chainId`
    async fn chain_id(&self) -> LedgerResult<u64>;

    /// `eth_call` at the latest block; reverts surface as [`LedgerError::Revert`]
    async fn call(&self, request: &CallRequest) -> LedgerResult<Bytes>;

    /// `eth_getCode` at the latest block
    async fn code_at(&self, address: Address) -> LedgerResult<Bytes>;

    /// `eth_getTransactionCount` at the pending block
    async fn pending_nonce(&self, address: Address) -> LedgerResult<u64>;

    /// `eth_getTransactionCount` at the latest block; every nonce below it is mined
    async fn latest_nonce(&self, address: Address) -> LedgerResult<u64>;

    /// `eth_gasPrice`
    async fn gas_price(&self) -> LedgerResult<u128>;

    /// `eth_sendRawTransaction`, returns the transaction hash reported by the node
    async fn send_raw_transaction(&self, raw: &[u8]) -> LedgerResult<B256>;

    /// `eth_getTransactionReceipt`, `None` while the transaction is unmined
    async fn transaction_receipt(&self, hash: B256) -> LedgerResult<Option<LedgerReceipt>>;
}

/// HTTP JSON-RPC ledger client
#[derive(Debug, Clone)]
pub struct AlloyLedgerClient {
    provider: RootProvider<Http<Client>>,
    timeout: Duration,
}

impl AlloyLedgerClient {
    /// Create a new client for `rpc_url`; every call is bounded by `timeout`
    pub fn new(rpc_url: &str, timeout: Duration) -> LedgerResult<Self> {
        let url = rpc_url.parse().map_err(|e| LedgerError::Transport {
            method: "connect",
            message: format!("invalid RPC URL: {}", e),
        })?;

        Ok(Self {
            provider: ProviderBuilder::new().on_http(url),
            timeout,
        })
    }

    /// Run one RPC call under the configured deadline
    async fn bounded<T, F>(&self, method: &'static str, fut: F) -> LedgerResult<T>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        match timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(map_transport_error(method, e)),
            Err(_) => {
                tracing::warn!(method, timeout_ms = self.timeout.as_millis() as u64, "Ledger call timed out");
                Err(LedgerError::Timeout { method })
            }
        }
    }
}

#[async_trait]
impl LedgerClient for AlloyLedgerClient {
    async fn chain_id(&self) -> LedgerResult<u64> {
        self.bounded("eth_chainId", async { self.provider.get_chain_id().await })
            .await
    }

    async fn call(&self, request: &CallRequest) -> LedgerResult<Bytes> {
        let mut tx = TransactionRequest::default()
            .from(request.from)
            .to(request.to)
            .input(TransactionInput::from(request.data.clone()));
        tx.gas = Some(request.gas.into());

        self.bounded("eth_call", async { self.provider.call(&tx).await })
            .await
    }

    async fn code_at(&self, address: Address) -> LedgerResult<Bytes> {
        self.bounded("eth_getCode", async {
            self.provider.get_code_at(address).await
        })
        .await
    }

    async fn pending_nonce(&self, address: Address) -> LedgerResult<u64> {
        self.bounded("eth_getTransactionCount", async {
            self.provider
                .get_transaction_count(address)
                .block_id(BlockId::Number(BlockNumberOrTag::Pending))
                .await
        })
        .await
    }

    async fn latest_nonce(&self, address: Address) -> LedgerResult<u64> {
        self.bounded("eth_getTransactionCount", async {
            self.provider
                .get_transaction_count(address)
                .block_id(BlockId::Number(BlockNumberOrTag::Latest))
                .await
        })
        .await
    }

    async fn gas_price(&self) -> LedgerResult<u128> {
        self.bounded("eth_gasPrice", async { self.provider.get_gas_price().await })
            .await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> LedgerResult<B256> {
        let pending = self
            .bounded("eth_sendRawTransaction", async {
                self.provider.send_raw_transaction(raw).await
            })
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: B256) -> LedgerResult<Option<LedgerReceipt>> {
        let receipt = self
            .bounded("eth_getTransactionReceipt", async {
                self.provider.get_transaction_receipt(hash).await
            })
            .await?;
        Ok(receipt.map(|r| to_ledger_receipt(&r)))
    }
}

/// Convert an RPC receipt into the transport-neutral form
pub fn to_ledger_receipt(receipt: &TransactionReceipt) -> LedgerReceipt {
    LedgerReceipt {
        transaction_hash: receipt.transaction_hash,
        block_hash: receipt.block_hash,
        block_number: receipt.block_number,
        gas_used: u128::from(receipt.gas_used),
        cumulative_gas_used: u128::from(receipt.inner.cumulative_gas_used()),
        effective_gas_price: receipt.effective_gas_price,
        logs_bloom: receipt.inner.logs_bloom().to_owned(),
        status: receipt.inner.status(),
        logs: receipt.inner.logs().iter().map(|log| log.inner.clone()).collect(),
    }
}

/// Map a transport error into a [`LedgerError`], keeping revert payloads
fn map_transport_error(method: &'static str, err: TransportError) -> LedgerError {
    match err {
        RpcError::ErrorResp(payload) => {
            let data = payload.as_revert_data();
            if data.is_some() || payload.message.contains("revert") {
                LedgerError::Revert {
                    message: payload.message.to_string(),
                    data,
                }
            } else {
                LedgerError::Transport {
                    method,
                    message: format!("{} (code {})", payload.message, payload.code),
                }
            }
        }
        RpcError::NullResp => LedgerError::InvalidResponse(format!("{} returned null", method)),
        RpcError::DeserError { err, text } => {
            LedgerError::InvalidResponse(format!("{}: {} | raw: {}", method, err, text))
        }
        other => LedgerError::Transport {
            method,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, method},
        Mock, MockServer, ResponseTemplate,
    };

    async fn rpc_result(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 0,
                "result": result
            })))
            .mount(server)
            .await;
    }

    fn client(server: &MockServer) -> AlloyLedgerClient {
        AlloyLedgerClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_chain_id_and_gas_price() {
        let mock_server = MockServer::start().await;
        rpc_result(&mock_server, "eth_chainId", json!("0xc4")).await;
        rpc_result(&mock_server, "eth_gasPrice", json!("0x3b9aca00")).await;

        let client = client(&mock_server);
        assert_eq!(client.chain_id().await.unwrap(), 196);
        assert_eq!(client.gas_price().await.unwrap(), 1_000_000_000);
    }

    #[tokio::test]
    async fn test_pending_nonce() {
        let mock_server = MockServer::start().await;
        rpc_result(&mock_server, "eth_getTransactionCount", json!("0x2a")).await;

        let nonce = client(&mock_server).pending_nonce(Address::ZERO).await.unwrap();
        assert_eq!(nonce, 42);
        let nonce = client(&mock_server).latest_nonce(Address::ZERO).await.unwrap();
        assert_eq!(nonce, 42);
    }

    #[tokio::test]
    async fn test_missing_receipt_is_none() {
        let mock_server = MockServer::start().await;
        rpc_result(&mock_server, "eth_getTransactionReceipt", serde_json::Value::Null).await;

        let receipt = client(&mock_server)
            .transaction_receipt(B256::repeat_byte(1))
            .await
            .unwrap();
        assert!(receipt.is_none());
    }

    #[tokio::test]
    async fn test_call_revert_keeps_data() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_call" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 0,
                "error": {
                    "code": 3,
                    "message": "execution reverted",
                    "data": "0xdeadbeef"
                }
            })))
            .mount(&mock_server)
            .await;

        let request = CallRequest {
            from: Address::ZERO,
            to: Address::repeat_byte(0x11),
            data: Bytes::from_static(&[0x01]),
            gas: 15_000_000,
        };
        match client(&mock_server).call(&request).await {
            Err(LedgerError::Revert { message, data }) => {
                assert_eq!(message, "execution reverted");
                assert_eq!(data, Some(Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef])));
            }
            other => panic!("expected revert, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_revert_error_is_transport() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 0,
                "error": { "code": -32601, "message": "method not found" }
            })))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server).gas_price().await.unwrap_err();
        assert!(matches!(err, LedgerError::Transport { method: "eth_gasPrice", .. }));
    }

    #[tokio::test]
    async fn test_slow_node_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jsonrpc": "2.0", "id": 0, "result": "0x1" }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let client = AlloyLedgerClient::new(&mock_server.uri(), Duration::from_millis(50)).unwrap();
        let err = client.chain_id().await.unwrap_err();
        assert!(matches!(err, LedgerError::Timeout { method: "eth_chainId" }));
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(AlloyLedgerClient::new("not a url", Duration::from_secs(1)).is_err());
    }
}
