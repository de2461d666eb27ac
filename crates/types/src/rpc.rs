//! JSON-RPC envelopes used by the HTTP API

use crate::user_operation::RawPackedUserOperation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parse error (malformed JSON body)
pub const PARSE_ERROR: i64 = -32700;
/// Missing or invalid parameters
pub const INVALID_PARAMS: i64 = -32602;
/// Simulation, queue or lookup failure
pub const SERVER_ERROR: i64 = -32000;

pub const JSONRPC_VERSION: &str = "2.0";

/// Incoming request envelope; `params` is interpreted per route
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub params: Value,
}

/// Parameters of `sendUserOp`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendUserOpParams {
    pub ops: Vec<RawPackedUserOperation>,
    pub op_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// Outgoing response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(RpcErrorObject {
                code,
                message: message.into(),
            }),
        }
    }
}
