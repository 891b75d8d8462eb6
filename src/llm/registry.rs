use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AppConfig, LlmConfig};
use crate::errors::{RentClawError, RentClawResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::ollama::OllamaProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    /// Kept for role-to-model lookups (does not need to be mutable after init).
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> RentClawResult<Arc<dyn LlmProvider>> {
        self.providers
            .get(&self.active)
            .cloned()
            .ok_or_else(|| RentClawError::Config(format!("Active provider '{}' not found in registry", self.active)))
    }

    /// Return the provider and call configuration for a named agent role.
    ///
    /// Role resolution order:
    /// 1. `[llm.roles.<role>]` in config.toml
    /// 2. Fallback: active provider with its default model / temperature
    pub fn call_config_for_role(&self, role: &str) -> RentClawResult<(Arc<dyn LlmProvider>, CallConfig)> {
        let role_entry = match role {
            "routing" => self.llm_config.roles.routing.as_ref(),
            other => {
                tracing::warn!(role = other, "unknown role, falling back to active provider");
                None
            }
        };

        if let Some(entry) = role_entry {
            let provider = self.providers.get(&entry.provider).cloned().ok_or_else(|| {
                RentClawError::Config(format!(
                    "Role '{}' references unknown provider '{}'",
                    role, entry.provider
                ))
            })?;
            let temperature = entry.temperature.unwrap_or_else(|| {
                self.llm_config
                    .providers
                    .get(&entry.provider)
                    .map(|p| p.temperature)
                    .unwrap_or(0.1)
            });
            tracing::debug!(
                role = role,
                provider = %entry.provider,
                model = %entry.model,
                temperature = temperature,
                "resolved role config"
            );
            return Ok((provider, CallConfig {
                model: entry.model.clone(),
                temperature,
            }));
        }

        // Fallback: active provider, provider-level defaults
        let provider = self.get_active()?;
        let entry = self.llm_config.providers.get(&self.active);
        let (model, temperature) = entry
            .map(|p| (p.model.clone(), p.temperature))
            .unwrap_or_else(|| (String::new(), 0.1));
        tracing::debug!(
            role = role,
            provider = %self.active,
            model = %model,
            "role not configured, using active provider fallback"
        );
        Ok((provider, CallConfig { model, temperature }))
    }

    /// Build a registry from the loaded app config.
    /// API keys are read from environment variables named `RENTCLAW_<ID>_API_KEY`.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
            active: config.llm.active_provider.clone(),
            llm_config: config.llm.clone(),
        };
        for (id, entry) in &config.llm.providers {
            let provider: Arc<dyn LlmProvider> = match entry.adapter.as_deref() {
                Some("ollama") => Arc::new(OllamaProvider::new(id.clone(), entry.api_base.clone())),
                Some(other) => {
                    tracing::warn!(provider = %id, adapter = other, "unknown adapter, using OpenAI-compatible");
                    Arc::new(openai_provider(id, entry.api_base.clone(), entry.api_key.as_deref()))
                }
                None => Arc::new(openai_provider(id, entry.api_base.clone(), entry.api_key.as_deref())),
            };
            registry.register(provider);
        }
        registry
    }
}

fn openai_provider(id: &str, api_base: String, config_key: Option<&str>) -> OpenAiCompatibleProvider {
    let api_key = std::env::var(format!("RENTCLAW_{}_API_KEY", id.to_uppercase()))
        .unwrap_or_else(|_| config_key.unwrap_or_default().to_string());
    OpenAiCompatibleProvider::new(id.to_string(), api_base, api_key)
}
