use async_trait::async_trait;

use crate::errors::RentClawResult;
use crate::llm::types::{CallConfig, ChatMessage};

/// Unified LLM provider trait. All providers implement this trait.
/// New providers only need to implement this trait and register in config.toml.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider's identifier (matches config.toml key).
    fn name(&self) -> &str;

    /// One non-streaming completion: messages in, assistant text out.
    async fn complete(&self, messages: Vec<ChatMessage>, cfg: &CallConfig) -> RentClawResult<String>;
}
