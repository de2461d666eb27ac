//! API route definitions

use crate::api::handlers;
use crate::app::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create the main API router
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        // JSON-RPC endpoints
        .route("/rpc/sendUserOp", post(handlers::send_user_op))
        .route("/rpc/getUserOpReceipt", post(handlers::get_user_op_receipt))
        .route(
            "/rpc/getChainId",
            get(handlers::get_chain_id).post(handlers::get_chain_id),
        )
        // Health and status endpoints
        .route("/healthz", get(handlers::health_check))
        .route("/status", get(handlers::system_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mempool::OperationQueue;
    use alloy::primitives::{address, Address, Bytes, B256, U256};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use config::Config;
    use ledger_client::mock::MockLedger;
    use serde_json::{json, Value};
    use simulator::EntryPointSimulator;
    use tower::util::ServiceExt;
    use types::{
        LedgerError, RawPackedUserOperation, TxReceipt, UserOperation, UserOperationReceipt,
    };

    const ENTRY_POINT: Address = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");
    const FACTORY: Address = address!("91E60e0613810449d098b0b5Ec8b51A0FE8c8985");
    const BUNDLER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const OP_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

    fn create_test_state(ledger: Arc<MockLedger>) -> Arc<AppState> {
        let mut config = Config::default();
        config.network.chain_id = 196;

        let validator =
            EntryPointSimulator::new(ledger.clone(), ENTRY_POINT, FACTORY, BUNDLER, 15_000_000);

        Arc::new(AppState {
            config,
            queue: Arc::new(OperationQueue::new()),
            validator: Arc::new(validator),
            ledger,
            bundler_address: BUNDLER,
            entry_point: ENTRY_POINT,
            chain_id: 196,
        })
    }

    fn operation() -> UserOperation {
        UserOperation {
            sender: Address::repeat_byte(0x42),
            nonce: U256::from(9),
            init_code: Bytes::new(),
            call_data: Bytes::new(),
            account_gas_limits: Default::default(),
            pre_verification_gas: U256::from(100_000),
            gas_fees: Default::default(),
            paymaster_and_data: Bytes::new(),
            signature: Bytes::new(),
        }
    }

    fn send_body(op: &UserOperation, op_hash: &str) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "sendUserOp",
            "params": {
                "ops": [RawPackedUserOperation::from(op)],
                "opHash": op_hash,
            }
        })
    }

    async fn call(app: Router, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_json(state: Arc<AppState>, uri: &str, body: Value) -> (StatusCode, Value) {
        let app = create_routes().with_state(state);
        call(app, "POST", uri, Body::from(body.to_string())).await
    }

    #[tokio::test]
    async fn test_send_user_op_accepted() {
        let state = create_test_state(Arc::new(MockLedger::new(196)));
        let (status, body) =
            post_json(state.clone(), "/rpc/sendUserOp", send_body(&operation(), OP_HASH)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "jsonrpc": "2.0", "id": 7, "result": "ok" }));
        assert_eq!(state.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_send_user_op_malformed_json() {
        let state = create_test_state(Arc::new(MockLedger::new(196)));
        let app = create_routes().with_state(state);
        let (status, body) = call(app, "POST", "/rpc/sendUserOp", Body::from("{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_send_user_op_empty_ops() {
        let state = create_test_state(Arc::new(MockLedger::new(196)));
        let (status, body) = post_json(
            state,
            "/rpc/sendUserOp",
            json!({ "jsonrpc": "2.0", "id": "abc", "params": { "ops": [], "opHash": OP_HASH } }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], -32602);
        assert_eq!(body["error"]["message"], "Invalid params");
        assert_eq!(body["id"], "abc");
    }

    #[tokio::test]
    async fn test_send_user_op_bad_field_named() {
        let state = create_test_state(Arc::new(MockLedger::new(196)));
        let mut body = send_body(&operation(), OP_HASH);
        body["params"]["ops"][0]["gasFees"] = json!("0x1234");

        let (status, body) = post_json(state.clone(), "/rpc/sendUserOp", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], -32602);
        assert!(body["error"]["message"].as_str().unwrap().contains("gasFees"));
        assert!(state.queue.is_empty());
    }

    #[tokio::test]
    async fn test_send_user_op_low_gas() {
        let state = create_test_state(Arc::new(MockLedger::new(196)));
        let mut op = operation();
        op.pre_verification_gas = U256::from(41_707);

        let (status, body) = post_json(state.clone(), "/rpc/sendUserOp", send_body(&op, OP_HASH)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], -32000);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("preVerificationGas too low"));
        assert!(state.queue.is_empty());
    }

    #[tokio::test]
    async fn test_send_user_op_simulation_revert() {
        let ledger = Arc::new(MockLedger::new(196));
        ledger.set_call_result(Err(LedgerError::Revert {
            message: "execution reverted: FailedOp(0,AA21 didn't pay prefund)".to_string(),
            data: None,
        }));
        let state = create_test_state(ledger);

        let (status, body) =
            post_json(state.clone(), "/rpc/sendUserOp", send_body(&operation(), OP_HASH)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], -32000);
        assert_eq!(
            body["error"]["message"],
            "simulate failed with EntryPoint revert: FailedOp(0,AA21 didn't pay prefund)"
        );
        assert!(state.queue.is_empty());
    }

    #[tokio::test]
    async fn test_send_user_op_duplicate() {
        let state = create_test_state(Arc::new(MockLedger::new(196)));
        post_json(state.clone(), "/rpc/sendUserOp", send_body(&operation(), OP_HASH)).await;

        let other = "0x2222222222222222222222222222222222222222222222222222222222222222";
        let (status, body) =
            post_json(state.clone(), "/rpc/sendUserOp", send_body(&operation(), other)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], -32000);
        assert!(body["error"]["message"].as_str().unwrap().starts_with("duplicate op"));
        assert_eq!(state.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_receipt_unknown_op() {
        let state = create_test_state(Arc::new(MockLedger::new(196)));
        let (status, body) = post_json(
            state,
            "/rpc/getUserOpReceipt",
            json!({ "jsonrpc": "2.0", "id": 1, "params": [OP_HASH] }),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], -32000);
        assert_eq!(body["error"]["message"], format!("op not found: {}", OP_HASH));
        assert_eq!(body["id"], 1);
    }

    #[tokio::test]
    async fn test_receipt_pending_op() {
        let state = create_test_state(Arc::new(MockLedger::new(196)));
        post_json(state.clone(), "/rpc/sendUserOp", send_body(&operation(), OP_HASH)).await;

        let (status, body) = post_json(
            state,
            "/rpc/getUserOpReceipt",
            json!({ "jsonrpc": "2.0", "id": 2, "params": [OP_HASH] }),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["result"], json!({ "opHash": OP_HASH, "state": "pending" }));
    }

    #[tokio::test]
    async fn test_receipt_sent_op() {
        let state = create_test_state(Arc::new(MockLedger::new(196)));
        let op_hash: B256 = OP_HASH.parse().unwrap();
        let key = state.queue.add(operation(), op_hash).unwrap();

        let tx_hash = B256::repeat_byte(0x77);
        state.queue.set_as_bundled(&key, tx_hash, 0);
        state.queue.set_as_sent(
            &key,
            UserOperationReceipt {
                user_op_hash: op_hash,
                sender: operation().sender,
                nonce: U256::from(9),
                paymaster: None,
                success: true,
                actual_gas_cost: U256::from(0x5208),
                actual_gas_used: U256::from(0xa410),
                receipt: TxReceipt {
                    transaction_hash: tx_hash,
                    block_hash: Some(B256::repeat_byte(0x88)),
                    block_number: Some(alloy::primitives::U64::from(12)),
                    logs_bloom: Default::default(),
                    gas_used: U256::from(100_000),
                    cumulative_gas_used: U256::from(100_000),
                    effective_gas_price: U256::from(1_000_000_000u64),
                    status: alloy::primitives::U64::from(1),
                },
            },
        );

        let (status, body) = post_json(
            state,
            "/rpc/getUserOpReceipt",
            json!({ "jsonrpc": "2.0", "id": 3, "params": [OP_HASH] }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let result = &body["result"];
        assert_eq!(result["opHash"], OP_HASH);
        assert_eq!(result["state"], "sent");
        assert_eq!(result["receipt"]["userOpHash"], OP_HASH);
        assert_eq!(result["receipt"]["success"], true);
        assert_eq!(result["receipt"]["actualGasCost"], "0x5208");
        assert_eq!(result["receipt"]["receipt"]["blockNumber"], "0xc");
        assert_eq!(result["receipt"]["receipt"]["transactionHash"], tx_hash.to_string());
        assert!(result["receipt"].get("paymaster").is_none());
    }

    #[tokio::test]
    async fn test_receipt_invalid_params() {
        let state = create_test_state(Arc::new(MockLedger::new(196)));
        let (status, body) = post_json(
            state,
            "/rpc/getUserOpReceipt",
            json!({ "jsonrpc": "2.0", "id": 4, "params": ["0x1234"] }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_chain_id_get_and_post() {
        let state = create_test_state(Arc::new(MockLedger::new(196)));

        let app = create_routes().with_state(state.clone());
        let (status, body) = call(app, "GET", "/rpc/getChainId", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "0xc4");
        assert_eq!(body["id"], Value::Null);

        let (status, body) = post_json(
            state,
            "/rpc/getChainId",
            json!({ "jsonrpc": "2.0", "id": 5 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "jsonrpc": "2.0", "id": 5, "result": "0xc4" }));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let ledger = Arc::new(MockLedger::new(196));
        let state = create_test_state(ledger.clone());

        let app = create_routes().with_state(state.clone());
        let (status, body) = call(app, "GET", "/healthz", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"]["ledger"]["chainId"], 196);

        ledger.set_unreachable(true);
        let app = create_routes().with_state(state);
        let (status, body) = call(app, "GET", "/healthz", Body::empty()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let state = create_test_state(Arc::new(MockLedger::new(196)));
        post_json(state.clone(), "/rpc/sendUserOp", send_body(&operation(), OP_HASH)).await;

        let app = create_routes().with_state(state);
        let (status, body) = call(app, "GET", "/status", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "bundler");
        assert_eq!(body["chainId"], 196);
        assert_eq!(body["queue"]["pending"], 1);
        assert_eq!(body["queue"]["total"], 1);
    }
}
