//! Client for a local Ollama server (`/api/chat`, non-streaming).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{RentClawError, RentClawResult};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage};

pub struct OllamaProvider {
    id: String,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(id: String, base_url: String) -> Self {
        Self {
            id,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.id
    }

    #[tracing::instrument(skip(self, messages, cfg), fields(provider = %self.id, model = %cfg.model))]
    async fn complete(&self, messages: Vec<ChatMessage>, cfg: &CallConfig) -> RentClawResult<String> {
        let url = format!("{}/api/chat", self.base_url);
        let body = OllamaRequest {
            model: &cfg.model,
            messages: &messages,
            stream: false,
            options: OllamaOptions {
                temperature: cfg.temperature,
            },
        };

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RentClawError::Oracle(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| RentClawError::Oracle(format!("invalid Ollama response: {e}")))?;

        tracing::info!(content_len = parsed.message.content.len(), "Ollama response received");
        Ok(parsed.message.content)
    }
}
