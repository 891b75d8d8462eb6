use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{RentClawError, RentClawResult};
use crate::tools::ToolSchema;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub dialogue: DialogueConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub active_provider: String,
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "ollama".to_string(),
            ProviderEntry {
                display_name: "Ollama (local)".to_string(),
                api_base: "http://localhost:11434".to_string(),
                model: "mistral".to_string(),
                temperature: default_temperature(),
                adapter: Some("ollama".to_string()),
                api_key: None,
            },
        );
        Self {
            active_provider: "ollama".to_string(),
            providers,
            roles: RolesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    /// Ollama: server root. OpenAI-compatible: full chat completions URL.
    pub api_base: String,
    /// Default model for this provider (used as fallback when no role config exists).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// "ollama" for a local Ollama server, None for OpenAI-compatible
    pub adapter: Option<String>,
    /// Optional API key stored in config.toml (falls back to env var RENTCLAW_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Maps agent roles to specific provider+model combinations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Intent classifier: picks a tool or declines.
    pub routing: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    /// Model name sent to the API.
    pub model: String,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
}

fn default_temperature() -> f64 {
    0.1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_oracle_timeout(),
        }
    }
}

fn default_oracle_timeout() -> u64 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default = "default_mcp_server")]
    pub server: McpServerEntry,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server: default_mcp_server(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

/// Either `url` (Streamable HTTP) or `command` (stdio) must be set; `url` wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerEntry {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_mcp_server() -> McpServerEntry {
    McpServerEntry {
        name: "rental-car-server".to_string(),
        url: Some("http://127.0.0.1:8000/mcp".to_string()),
        command: None,
        args: Vec::new(),
    }
}

fn default_call_timeout() -> u64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Keep turns in memory and show them to the classifier.
    #[serde(default)]
    pub enabled: bool,
    /// How many past turns are included in the classifier prompt.
    #[serde(default = "default_prompt_turns")]
    pub prompt_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prompt_turns: default_prompt_turns(),
        }
    }
}

fn default_prompt_turns() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// Added to the built-in exit words (exit, quit, q, bye).
    #[serde(default)]
    pub exit_words: Vec<String>,
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            exit_words: Vec::new(),
            greeting: default_greeting(),
        }
    }
}

fn default_greeting() -> String {
    "Rental car assistant. Ask for cars, details or a booking.".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    /// Registered in addition to the built-in rental tools.
    #[serde(default)]
    pub extra: Vec<ToolSchema>,
}

fn default_true() -> bool {
    true
}

fn resolve_config_path() -> RentClawResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("rentclaw").join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config dir");
            return Ok(candidate);
        }
    }

    Err(RentClawError::Config(
        "config.toml not found next to executable, in working directory or user config dir".into(),
    ))
}

/// Load the config from an explicit path, or search the usual locations.
pub fn load_config(explicit: Option<&Path>) -> RentClawResult<AppConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => resolve_config_path()?,
    };
    let content = std::fs::read_to_string(&path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> RentClawResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
