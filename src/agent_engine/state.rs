use std::collections::BTreeMap;

/// Parameter name → value. Ordered so prompts, logs and payloads are stable.
pub type ParamMap = BTreeMap<String, String>;

/// Lifecycle states of the dialogue loop.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogueState {
    AwaitingInput,
    Classifying { utterance: String },
    ResolvingParams { tool_name: String, params: ParamMap },
    Invoking { request: ToolCallRequest },
    Formatting { request: ToolCallRequest, outcome: ToolOutcome },
}

impl DialogueState {
    pub fn name(&self) -> &'static str {
        match self {
            DialogueState::AwaitingInput => "awaiting_input",
            DialogueState::Classifying { .. } => "classifying",
            DialogueState::ResolvingParams { .. } => "resolving_params",
            DialogueState::Invoking { .. } => "invoking",
            DialogueState::Formatting { .. } => "formatting",
        }
    }
}

/// What the classifier decided for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentDecision {
    UseTool { tool_name: String, params: ParamMap },
    Decline { message: String },
}

impl IntentDecision {
    pub fn use_tool(tool_name: impl Into<String>, params: ParamMap) -> Self {
        IntentDecision::UseTool {
            tool_name: tool_name.into(),
            params,
        }
    }

    pub fn decline(message: impl Into<String>) -> Self {
        IntentDecision::Decline {
            message: message.into(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        match self {
            IntentDecision::UseTool { params, .. } => params.get(name).map(String::as_str),
            IntentDecision::Decline { .. } => None,
        }
    }
}

/// A fully parameterized call. Only the parameter resolver builds these, so
/// every required parameter of the tool is present.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    tool_name: String,
    params: ParamMap,
}

impl ToolCallRequest {
    pub(crate) fn new(tool_name: String, params: ParamMap) -> Self {
        Self { tool_name, params }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub fn arguments(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.params
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        )
    }
}

/// Result of one tool invocation, as seen from this side of the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The service answered; the payload may still carry a domain error.
    Success { payload: serde_json::Value },
    /// The service could not be reached or its answer not understood.
    Failure { reason: String },
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success { .. })
    }
}
