use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::agent_engine::state::{ToolCallRequest, ToolOutcome};
use crate::errors::{error_chain, RentClawResult};
use crate::tools::ToolRegistry;

/// Remote side of a tool call. Returns the tool's JSON payload; domain
/// errors travel inside the payload, transport problems as `Err`.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn call(&self, tool_name: &str, arguments: Value) -> RentClawResult<Value>;
}

pub struct ToolInvoker {
    backend: Arc<dyn ToolBackend>,
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolInvoker {
    pub fn new(backend: Arc<dyn ToolBackend>, registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self {
            backend,
            registry,
            timeout,
        }
    }

    /// Never fails: anything that keeps a payload from coming back is a
    /// `Failure` carrying the rendered cause.
    #[tracing::instrument(skip(self, request), fields(tool = %request.tool_name()))]
    pub async fn invoke(&self, request: &ToolCallRequest) -> ToolOutcome {
        if !self.registry.is_registered(request.tool_name()) {
            tracing::warn!("refusing to call unregistered tool");
            return ToolOutcome::Failure {
                reason: format!("unknown tool '{}'", request.tool_name()),
            };
        }

        let started = Instant::now();
        let call = self.backend.call(request.tool_name(), request.arguments());
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(payload)) => ToolOutcome::Success { payload },
            Ok(Err(e)) => ToolOutcome::Failure {
                reason: error_chain(&e),
            },
            Err(_) => ToolOutcome::Failure {
                reason: format!("timed out after {}s", self.timeout.as_secs()),
            },
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            ToolOutcome::Success { .. } => tracing::info!(elapsed_ms, "tool call succeeded"),
            ToolOutcome::Failure { reason } => {
                tracing::warn!(elapsed_ms, reason = %reason, "tool call failed")
            }
        }
        outcome
    }
}
