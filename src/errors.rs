use thiserror::Error;

#[derive(Debug, Error)]
pub enum RentClawError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM provider error: {0}")]
    Oracle(String),

    #[error("LLM provider timed out after {0}s")]
    OracleTimeout(u64),

    #[error("Unparseable LLM output: {0}")]
    UnparseableOracleOutput(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Terminal error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
}

pub type RentClawResult<T> = Result<T, RentClawError>;

/// Renders an error followed by its `source()` chain, skipping causes whose
/// text is already contained in the message.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}
