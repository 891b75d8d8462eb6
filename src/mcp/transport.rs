use async_trait::async_trait;
use serde_json::Value;

use crate::errors::RentClawResult;

/// Carries JSON-RPC messages to one MCP server.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a request and wait for the response carrying the same `id`.
    async fn request(&self, request: Value) -> RentClawResult<Value>;

    /// Send a notification; no response is expected.
    async fn notify(&self, notification: Value) -> RentClawResult<()>;
}

pub fn jsonrpc_request(method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": uuid::Uuid::new_v4().to_string(),
        "method": method,
        "params": params,
    })
}

pub fn jsonrpc_notification(method: &str) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": {},
    })
}
