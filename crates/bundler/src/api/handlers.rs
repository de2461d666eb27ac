//! HTTP API request handlers

use crate::admission::process_user_operation;
use crate::app::AppState;
use axum::{body::Bytes, extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use types::rpc::{
    RpcRequest, RpcResponse, SendUserOpParams, INVALID_PARAMS, PARSE_ERROR, SERVER_ERROR,
};
use types::utils::{generate_correlation_id, parse_hash};
use types::OperationState;

type RpcResult = Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)>;

fn rpc_ok(status: StatusCode, id: Value, result: Value) -> RpcResult {
    Ok((status, Json(to_json(RpcResponse::result(id, result)))))
}

fn rpc_err(status: StatusCode, id: Value, code: i64, message: impl Into<String>) -> RpcResult {
    Err((status, Json(to_json(RpcResponse::error(id, code, message)))))
}

fn to_json(response: RpcResponse) -> Value {
    serde_json::to_value(response).unwrap_or(Value::Null)
}

/// Parse a JSON-RPC envelope; an empty body is accepted when `allow_empty`
fn parse_request(body: &Bytes, allow_empty: bool) -> Result<RpcRequest, (StatusCode, Json<Value>)> {
    if allow_empty && body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RpcRequest::default());
    }

    serde_json::from_slice::<RpcRequest>(body).map_err(|e| {
        debug!(error = %e, "Malformed JSON-RPC body");
        (
            StatusCode::BAD_REQUEST,
            Json(to_json(RpcResponse::error(Value::Null, PARSE_ERROR, "Invalid JSON"))),
        )
    })
}

/// Admit a user operation
pub async fn send_user_op(State(state): State<Arc<AppState>>, body: Bytes) -> RpcResult {
    let request = parse_request(&body, false)?;
    let id = request.id;
    let request_id = generate_correlation_id();

    let params = match serde_json::from_value::<SendUserOpParams>(request.params) {
        Ok(params) if !params.ops.is_empty() => params,
        _ => return rpc_err(StatusCode::BAD_REQUEST, id, INVALID_PARAMS, "Invalid params"),
    };

    let Some(op_hash) = parse_hash(&params.op_hash) else {
        return rpc_err(StatusCode::BAD_REQUEST, id, INVALID_PARAMS, "invalid opHash");
    };

    let op = match params.ops[0].decode() {
        Ok(op) => op,
        Err(e) => return rpc_err(StatusCode::BAD_REQUEST, id, INVALID_PARAMS, e.to_string()),
    };

    debug!(request_id = %request_id, sender = %op.sender, op_hash = %op_hash, "sendUserOp");

    match process_user_operation(
        state.validator.as_ref(),
        &state.queue,
        op,
        op_hash,
        state.config.validator.inject_init_code,
    )
    .await
    {
        Ok(key) => {
            info!(request_id = %request_id, key = %key, "sendUserOp accepted");
            rpc_ok(StatusCode::OK, id, json!("ok"))
        }
        Err(e) => {
            warn!(request_id = %request_id, op_hash = %op_hash, error = %e, "sendUserOp rejected");
            let code = if e.is_invalid_params() { INVALID_PARAMS } else { SERVER_ERROR };
            rpc_err(StatusCode::BAD_REQUEST, id, code, e.to_string())
        }
    }
}

/// Look up an admitted operation by its hash
pub async fn get_user_op_receipt(State(state): State<Arc<AppState>>, body: Bytes) -> RpcResult {
    let request = parse_request(&body, false)?;
    let id = request.id;

    let hash = match serde_json::from_value::<Vec<String>>(request.params) {
        Ok(params) => params.first().and_then(|h| parse_hash(h)),
        Err(_) => None,
    };
    let Some(op_hash) = hash else {
        return rpc_err(StatusCode::BAD_REQUEST, id, INVALID_PARAMS, "Invalid params");
    };

    let entry = match state.queue.get_by_hash(&op_hash) {
        Ok(entry) => entry,
        Err(e) => return rpc_err(StatusCode::NOT_FOUND, id, SERVER_ERROR, e.to_string()),
    };

    match (entry.state, entry.receipt) {
        (OperationState::Sent, Some(receipt)) => rpc_ok(
            StatusCode::OK,
            id,
            json!({
                "opHash": op_hash,
                "state": entry.state,
                "receipt": receipt,
            }),
        ),
        (state, _) => rpc_ok(
            StatusCode::NOT_FOUND,
            id,
            json!({
                "opHash": op_hash,
                "state": state,
            }),
        ),
    }
}

/// Configured chain ID as a hex quantity
pub async fn get_chain_id(State(state): State<Arc<AppState>>, body: Bytes) -> RpcResult {
    let request = parse_request(&body, true)?;
    rpc_ok(
        StatusCode::OK,
        request.id,
        json!(format!("0x{:x}", state.chain_id)),
    )
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let health = ledger_client::probe(state.ledger.as_ref(), state.chain_id).await;
    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if health.healthy { "healthy" } else { "unhealthy" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "components": {
            "ledger": {
                "status": if health.healthy { "healthy" } else { "unhealthy" },
                "chainId": health.chain_id,
                "latencyMs": health.latency_ms,
                "error": health.error,
            },
            "queue": {
                "status": "healthy",
                "size": state.queue.len(),
            }
        }
    });

    (status, Json(body))
}

/// System status endpoint
pub async fn system_status(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let counts = state.queue.counts();

    (
        StatusCode::OK,
        Json(json!({
            "service": "bundler",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "chainId": state.chain_id,
            "entryPoint": state.entry_point,
            "bundler": state.bundler_address,
            "queue": {
                "pending": counts.pending,
                "bundled": counts.bundled,
                "sent": counts.sent,
                "total": counts.total(),
            }
        })),
    )
}
