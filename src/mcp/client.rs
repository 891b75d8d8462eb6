use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::McpServerEntry;
use crate::errors::{RentClawError, RentClawResult};
use crate::executor::dispatcher::ToolBackend;
use crate::mcp::http_transport::HttpTransport;
use crate::mcp::stdio_transport::StdioTransport;
use crate::mcp::transport::{jsonrpc_notification, jsonrpc_request, McpTransport};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

pub struct McpClient {
    pub server_name: String,
    transport: Box<dyn McpTransport>,
    initialized: Mutex<bool>,
}

impl McpClient {
    pub fn new(server_name: String, transport: Box<dyn McpTransport>) -> Self {
        Self {
            server_name,
            transport,
            initialized: Mutex::new(false),
        }
    }

    /// HTTP when the entry has a `url`, otherwise `command` over stdio.
    /// Nothing is contacted or spawned until the first call.
    pub fn from_config(entry: &McpServerEntry, timeout: Duration) -> RentClawResult<Self> {
        let transport: Box<dyn McpTransport> = match (&entry.url, &entry.command) {
            (Some(url), _) => Box::new(HttpTransport::new(url, timeout)?),
            (None, Some(command)) => Box::new(StdioTransport::new(command, &entry.args)),
            (None, None) => {
                return Err(RentClawError::Config(format!(
                    "MCP server '{}' needs either url or command",
                    entry.name
                )))
            }
        };
        Ok(Self::new(entry.name.clone(), transport))
    }

    /// Runs the initialize handshake once; retried on the next call if it fails.
    async fn ensure_initialized(&self) -> RentClawResult<()> {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return Ok(());
        }

        let request = jsonrpc_request(
            "initialize",
            serde_json::json!({
                "protocolVersion": "2025-06-18",
                "capabilities": {},
                "clientInfo": {
                    "name": "rentclaw",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        );
        let response = self.transport.request(request).await?;
        rpc_result(response)?;
        self.transport
            .notify(jsonrpc_notification("notifications/initialized"))
            .await?;

        tracing::info!(server = %self.server_name, "MCP session initialized");
        *initialized = true;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(server = %self.server_name))]
    pub async fn list_tools(&self) -> RentClawResult<Vec<McpTool>> {
        self.ensure_initialized().await?;
        let response = self
            .transport
            .request(jsonrpc_request("tools/list", serde_json::json!({})))
            .await?;
        let result = rpc_result(response)?;
        let tools = result
            .get("tools")
            .cloned()
            .ok_or_else(|| RentClawError::Mcp("Missing tools in response".into()))?;
        Ok(serde_json::from_value(tools)?)
    }

    /// Raw `tools/call` result (content items, isError flag, ...).
    #[tracing::instrument(skip(self, arguments), fields(server = %self.server_name, tool.name = %name))]
    pub async fn call_tool(&self, name: &str, arguments: Value) -> RentClawResult<Value> {
        self.ensure_initialized().await?;
        let request = jsonrpc_request(
            "tools/call",
            serde_json::json!({
                "name": name,
                "arguments": arguments,
            }),
        );
        let response = self.transport.request(request).await?;
        rpc_result(response)
    }
}

#[async_trait]
impl ToolBackend for McpClient {
    async fn call(&self, tool_name: &str, arguments: Value) -> RentClawResult<Value> {
        let result = self.call_tool(tool_name, arguments).await?;
        payload_from_result(&result)
    }
}

fn rpc_result(response: Value) -> RentClawResult<Value> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error");
        return Err(RentClawError::Mcp(format!("MCP call failed: {}", message)));
    }
    response
        .get("result")
        .cloned()
        .ok_or_else(|| RentClawError::Mcp("Missing result in MCP response".into()))
}

/// Turns a `tools/call` result into the tool's JSON payload.
///
/// The first text item is decoded as JSON (plain text stays a string);
/// `structuredContent` is used when there is no text. A result flagged
/// `isError` becomes `{"error": <text>}` so it reads as a domain error.
pub fn payload_from_result(result: &Value) -> RentClawResult<Value> {
    let text = result
        .get("content")
        .and_then(|c| c.as_array())
        .and_then(|items| {
            items
                .iter()
                .find(|item| item.get("type").and_then(|t| t.as_str()) == Some("text"))
        })
        .and_then(|item| item.get("text"))
        .and_then(|t| t.as_str());

    if result.get("isError").and_then(|e| e.as_bool()) == Some(true) {
        let message = text.unwrap_or("tool reported an error");
        return Ok(serde_json::json!({ "error": message }));
    }

    if let Some(text) = text {
        return Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())));
    }

    result
        .get("structuredContent")
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| RentClawError::Mcp("tool result has no content".into()))
}
