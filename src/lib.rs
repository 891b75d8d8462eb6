pub mod agent_engine;
pub mod commands;
pub mod config;
pub mod errors;
pub mod executor;
pub mod formatter;
pub mod llm;
pub mod mcp;
pub mod terminal;
pub mod tools;

#[cfg(test)]
mod test_http;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::agent_engine::classifier::IntentClassifier;
use crate::agent_engine::engine::DialogueEngine;
use crate::agent_engine::heuristics::HeuristicExtractor;
use crate::agent_engine::history::SessionContext;
use crate::agent_engine::resolver::ParamResolver;
use crate::config::AppConfig;
use crate::errors::RentClawResult;
use crate::executor::ToolInvoker;
use crate::formatter::ResponseFormatter;
use crate::llm::registry::ProviderRegistry;
use crate::mcp::{McpClient, McpTool};
use crate::terminal::RustylineTerminal;
use crate::tools::ToolRegistry;

/// Command-line switches, already parsed.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub remember: bool,
    pub no_oracle: bool,
    pub log: Option<String>,
    pub write_config: Option<PathBuf>,
}

/// `RUST_LOG` wins, then `--log`, then `warn`. Always stderr.
pub fn init_tracing(filter: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter.unwrap_or("warn")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run(opts: RunOptions) -> RentClawResult<()> {
    init_tracing(opts.log.as_deref());

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let config = match &opts.config {
        Some(path) => config::load_config(Some(path))?,
        None => config::load_config(None).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using built-in defaults");
            AppConfig::default()
        }),
    };

    if let Some(path) = &opts.write_config {
        config::save_config(&config, path)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let registry = Arc::new(ToolRegistry::builtin_with(config.tools.extra.clone())?);
    let mut heuristics = HeuristicExtractor::builtin()?;
    for schema in &config.tools.extra {
        heuristics = heuristics.with_keyword_group(&schema.name, &schema.keywords);
    }
    for tool in heuristics.keyword_tools() {
        if !registry.is_registered(tool) {
            tracing::warn!(tool = %tool, "keyword group names an unregistered tool");
        }
    }
    let heuristics = Arc::new(heuristics);

    let mut classifier = IntentClassifier::new(
        registry.clone(),
        heuristics.clone(),
        Duration::from_secs(config.oracle.timeout_secs),
    )?
    .with_prompt_turns(config.session.prompt_turns);

    if config.oracle.enabled && !opts.no_oracle {
        let providers = ProviderRegistry::from_config(&config);
        match providers.call_config_for_role("routing") {
            Ok((provider, cfg)) => {
                tracing::info!(provider = %provider.name(), model = %cfg.model, "oracle enabled");
                classifier = classifier.with_oracle(provider, cfg);
            }
            Err(e) => tracing::warn!(error = %e, "no oracle provider, classifying with heuristics only"),
        }
    } else {
        tracing::info!("oracle disabled, classifying with heuristics only");
    }

    let call_timeout = Duration::from_secs(config.mcp.call_timeout_secs);
    let client = Arc::new(McpClient::from_config(&config.mcp.server, call_timeout)?);
    check_tool_contract(&client, &registry, call_timeout).await;

    let mut engine = DialogueEngine::new(
        RustylineTerminal::new()?,
        registry.clone(),
        classifier,
        ParamResolver::new(registry.clone(), heuristics),
        ToolInvoker::new(client, registry.clone(), call_timeout),
        ResponseFormatter::new(registry),
    )
    .with_exit_words(config.dialogue.exit_words.clone())
    .with_greeting(config.dialogue.greeting.clone());

    if opts.remember || config.session.enabled {
        engine = engine.with_session(SessionContext::new());
    }

    engine.run().await;
    Ok(())
}

/// Warns about registered tools the server does not offer. Never fatal:
/// an unreachable server shows up again on every call.
async fn check_tool_contract(client: &McpClient, registry: &ToolRegistry, timeout: Duration) {
    let listed = match tokio::time::timeout(timeout, client.list_tools()).await {
        Ok(Ok(tools)) => tools,
        Ok(Err(e)) => {
            tracing::warn!(server = %client.server_name, error = %e, "could not list server tools");
            return;
        }
        Err(_) => {
            tracing::warn!(server = %client.server_name, "listing server tools timed out");
            return;
        }
    };
    for name in missing_tools(registry, &listed) {
        tracing::warn!(server = %client.server_name, tool = %name, "registered tool not offered by server");
    }
}

fn missing_tools(registry: &ToolRegistry, listed: &[McpTool]) -> Vec<String> {
    registry
        .names()
        .into_iter()
        .filter(|name| !listed.iter().any(|t| t.name == *name))
        .map(str::to_string)
        .collect()
}
