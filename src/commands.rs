//! Words the dialogue loop handles itself instead of classifying.

use crate::agent_engine::history::SessionContext;
use crate::agent_engine::state::IntentDecision;
use crate::tools::ToolRegistry;

pub const DEFAULT_EXIT_WORDS: &[&str] = &["exit", "quit", "q", "bye"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Help,
    History,
    Version,
}

impl MetaCommand {
    /// Only an utterance consisting of the bare word counts.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "help" | "?" => Some(MetaCommand::Help),
            "history" => Some(MetaCommand::History),
            "version" => Some(MetaCommand::Version),
            _ => None,
        }
    }
}

pub fn is_exit_word(text: &str, extra: &[String]) -> bool {
    let text = text.trim().to_lowercase();
    DEFAULT_EXIT_WORDS.iter().any(|w| *w == text) || extra.iter().any(|w| w.to_lowercase() == text)
}

pub fn help_text(registry: &ToolRegistry) -> String {
    let mut out = String::from("I can help with:");
    for schema in registry.schemas() {
        out.push_str(&format!("\n  {}({})", schema.name, schema.required_params.join(", ")));
        if !schema.description.is_empty() {
            out.push_str(&format!("  {}", schema.description));
        }
    }
    out.push_str("\nType 'history' for earlier turns, 'exit' to quit.");
    out
}

pub fn history_text(session: Option<&SessionContext>) -> String {
    let Some(session) = session else {
        return "History is off. Start with --remember to keep earlier turns.".to_string();
    };
    if session.is_empty() {
        return "No earlier turns yet.".to_string();
    }

    let mut out = String::new();
    for (i, turn) in session.turns().iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let decision = match &turn.decision {
            IntentDecision::UseTool { tool_name, params } => {
                let args: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
                format!("{}({})", tool_name, args.join(", "))
            }
            IntentDecision::Decline { .. } => "no tool".to_string(),
        };
        out.push_str(&format!("{:>2}. {} -> {}", i + 1, turn.utterance, decision));
    }
    out
}

pub fn version_text() -> String {
    format!("rentclaw {}", env!("CARGO_PKG_VERSION"))
}
