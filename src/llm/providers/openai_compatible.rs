use async_trait::async_trait;

use crate::errors::{RentClawError, RentClawResult};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage};

pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: String, api_base: String, api_key: String) -> Self {
        Self {
            id,
            api_base,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    #[tracing::instrument(skip(self, messages, cfg), fields(provider = %self.id, model = %cfg.model))]
    async fn complete(&self, messages: Vec<ChatMessage>, cfg: &CallConfig) -> RentClawResult<String> {
        let body = serde_json::json!({
            "model": cfg.model,
            "messages": &messages,
            "stream": false,
            "temperature": cfg.temperature,
        });

        tracing::debug!(messages = messages.len(), "sending LLM request");

        let mut request = self.client.post(&self.api_base).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(RentClawError::Oracle(format!("{}: {}", status, err_body)));
        }

        let json: serde_json::Value = response.json().await?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| RentClawError::Oracle("response has no message content".into()))?
            .to_string();

        tracing::info!(content_len = content.len(), "LLM JSON response received");
        Ok(content)
    }
}
