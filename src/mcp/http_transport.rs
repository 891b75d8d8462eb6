use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{RentClawError, RentClawResult};
use crate::mcp::sse;
use crate::mcp::transport::McpTransport;

const SESSION_HEADER: &str = "Mcp-Session-Id";

/// MCP Streamable HTTP transport (POST only; no server-initiated stream).
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    /// Assigned by the server on `initialize`, echoed on every later message.
    session_id: Mutex<Option<String>>,
}

impl HttpTransport {
    pub fn new(url: &str, timeout: Duration) -> RentClawResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            url: url.to_string(),
            client,
            session_id: Mutex::new(None),
        })
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|s| s.clone())
    }

    async fn post(&self, message: &Value) -> RentClawResult<reqwest::Response> {
        let mut req_builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream");

        if let Some(id) = self.session_id() {
            req_builder = req_builder.header(SESSION_HEADER, id);
        }

        let response = req_builder.json(message).send().await?;

        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(mut slot) = self.session_id.lock() {
                if slot.as_deref() != Some(id) {
                    tracing::debug!(session = %id, "MCP session assigned");
                    *slot = Some(id.to_string());
                }
            }
        }

        Ok(response)
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    #[tracing::instrument(skip(self, request), fields(url = %self.url, method = ?request.get("method")))]
    async fn request(&self, request: Value) -> RentClawResult<Value> {
        let response = self.post(&request).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RentClawError::Transport(format!(
                "MCP request failed with status {}: {}",
                status, body
            )));
        }

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let body = response.text().await?;
        if is_event_stream {
            let id = request.get("id").cloned().unwrap_or(Value::Null);
            sse::find_response(&body, &id)
        } else {
            serde_json::from_str(&body)
                .map_err(|e| RentClawError::Transport(format!("Failed to parse MCP response: {e}")))
        }
    }

    async fn notify(&self, notification: Value) -> RentClawResult<()> {
        let response = self.post(&notification).await?;
        let status = response.status();
        if status != reqwest::StatusCode::ACCEPTED && !status.is_success() {
            return Err(RentClawError::Transport(format!(
                "MCP notification failed with status {}",
                status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_http::{serve, CannedResponse};
    use serde_json::json;

    fn request(id: &str, method: &str) -> Value {
        json!({"jsonrpc": "2.0", "id": id, "method": method, "params": {}})
    }

    #[tokio::test]
    async fn session_id_is_echoed_and_event_stream_is_parsed() {
        let sse_body = format!(
            "event: message\ndata: {}\n\nevent: message\ndata: {}\n\n",
            json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {}}),
            json!({"jsonrpc": "2.0", "id": "req-2", "result": {"tools": []}})
        );
        let server = serve(vec![
            CannedResponse::json(200, json!({"jsonrpc": "2.0", "id": "req-1", "result": {}}))
                .with_header("Mcp-Session-Id", "sess-42"),
            CannedResponse::empty(202),
            CannedResponse::text(200, "text/event-stream", &sse_body),
        ])
        .await;
        let transport = HttpTransport::new(&server.url, Duration::from_secs(5)).unwrap();

        let first = transport.request(request("req-1", "initialize")).await.unwrap();
        assert_eq!(first["id"], "req-1");
        transport
            .notify(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await
            .unwrap();
        let listed = transport.request(request("req-2", "tools/list")).await.unwrap();
        assert_eq!(listed["result"], json!({"tools": []}));

        let seen = server.requests();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].header(SESSION_HEADER), None);
        assert!(seen[0]
            .header("accept")
            .is_some_and(|a| a.contains("application/json") && a.contains("text/event-stream")));
        assert_eq!(seen[0].json()["method"], "initialize");
        assert_eq!(seen[1].header(SESSION_HEADER), Some("sess-42"));
        assert_eq!(seen[2].header(SESSION_HEADER), Some("sess-42"));
    }

    #[tokio::test]
    async fn error_status_and_bad_body_are_transport_errors() {
        let server = serve(vec![
            CannedResponse::text(500, "text/plain", "boom"),
            CannedResponse::text(200, "application/json", "not json"),
            CannedResponse::text(404, "text/plain", ""),
        ])
        .await;
        let transport = HttpTransport::new(&server.url, Duration::from_secs(5)).unwrap();

        assert!(matches!(
            transport.request(request("a", "tools/list")).await,
            Err(RentClawError::Transport(m)) if m.contains("500") && m.contains("boom")
        ));
        assert!(matches!(
            transport.request(request("b", "tools/list")).await,
            Err(RentClawError::Transport(m)) if m.contains("Failed to parse")
        ));
        assert!(matches!(
            transport.notify(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).await,
            Err(RentClawError::Transport(m)) if m.contains("404")
        ));
    }

    #[tokio::test]
    async fn event_stream_without_matching_id_is_transport_error() {
        let body = format!("data: {}\n\n", json!({"jsonrpc": "2.0", "id": "other", "result": {}}));
        let server = serve(vec![CannedResponse::text(200, "text/event-stream", &body)]).await;
        let transport = HttpTransport::new(&server.url, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            transport.request(request("mine", "tools/list")).await,
            Err(RentClawError::Transport(_))
        ));
    }
}
