use std::sync::Arc;

use crate::agent_engine::classifier::IntentClassifier;
use crate::agent_engine::history::SessionContext;
use crate::agent_engine::resolver::ParamResolver;
use crate::agent_engine::state::{DialogueState, IntentDecision, ParamMap, ToolCallRequest};
use crate::commands::{self, MetaCommand};
use crate::errors::RentClawResult;
use crate::executor::ToolInvoker;
use crate::formatter::ResponseFormatter;
use crate::terminal::{Terminal, UserInput};
use crate::tools::ToolRegistry;

const PROMPT: &str = "you> ";
const GOODBYE: &str = "Goodbye!";

/// Drives one conversation: read, classify, resolve, invoke, format, repeat.
pub struct DialogueEngine<T: Terminal> {
    state: DialogueState,
    terminal: T,
    registry: Arc<ToolRegistry>,
    classifier: IntentClassifier,
    resolver: ParamResolver,
    invoker: ToolInvoker,
    formatter: ResponseFormatter,

    // ── Per-process conversation ─────────────────────────────────────────
    /// `None` = stateless: the classifier never sees earlier turns.
    session: Option<SessionContext>,
    /// Utterance of the turn in flight; parameter heuristics read it.
    utterance: String,

    exit_words: Vec<String>,
    greeting: Option<String>,
}

impl<T: Terminal> DialogueEngine<T> {
    pub fn new(
        terminal: T,
        registry: Arc<ToolRegistry>,
        classifier: IntentClassifier,
        resolver: ParamResolver,
        invoker: ToolInvoker,
        formatter: ResponseFormatter,
    ) -> Self {
        Self {
            state: DialogueState::AwaitingInput,
            terminal,
            registry,
            classifier,
            resolver,
            invoker,
            formatter,
            session: None,
            utterance: String::new(),
            exit_words: Vec::new(),
            greeting: None,
        }
    }

    pub fn with_session(mut self, session: SessionContext) -> Self {
        self.session = Some(session);
        self
    }

    /// Extra exit words on top of exit/quit/q/bye.
    pub fn with_exit_words(mut self, words: Vec<String>) -> Self {
        self.exit_words = words;
        self
    }

    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref()
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    pub fn state(&self) -> &DialogueState {
        &self.state
    }

    /// Returns on an exit word or an interrupt, nothing else.
    pub async fn run(&mut self) {
        if let Some(greeting) = self.greeting.clone() {
            self.terminal.show(&greeting);
        }

        loop {
            tracing::debug!(state = self.state.name(), "dialogue state");

            match std::mem::replace(&mut self.state, DialogueState::AwaitingInput) {
                // ── AwaitingInput: the only state that reads a new line ──
                DialogueState::AwaitingInput => match self.terminal.read_line(PROMPT) {
                    UserInput::Interrupted => {
                        tracing::info!("input interrupted, leaving dialogue");
                        break;
                    }
                    UserInput::Line(line) => {
                        let text = line.trim();
                        if text.is_empty() {
                            continue;
                        }
                        if commands::is_exit_word(text, &self.exit_words) {
                            tracing::info!("exit word received");
                            break;
                        }
                        if let Some(command) = MetaCommand::parse(text) {
                            let reply = self.meta_reply(command);
                            self.terminal.show(&reply);
                            continue;
                        }
                        self.state = DialogueState::Classifying {
                            utterance: text.to_string(),
                        };
                    }
                },

                // ── Classifying: oracle, else heuristics; never fails ────
                DialogueState::Classifying { utterance } => {
                    let decision = self.classifier.classify(&utterance, self.session.as_ref()).await;
                    match decision {
                        IntentDecision::Decline { message } => {
                            tracing::debug!("declined → AwaitingInput");
                            self.terminal.show(&message);
                            self.record(&utterance, IntentDecision::decline(message));
                        }
                        IntentDecision::UseTool { tool_name, params } => {
                            tracing::debug!(tool = %tool_name, given = params.len(), "Classifying → ResolvingParams");
                            self.utterance = utterance;
                            self.state = DialogueState::ResolvingParams { tool_name, params };
                        }
                    }
                }

                // ── ResolvingParams: may block on follow-up questions ────
                DialogueState::ResolvingParams { tool_name, params } => {
                    match self.resolve(&tool_name, params) {
                        Ok(Some(request)) => {
                            let utterance = std::mem::take(&mut self.utterance);
                            self.record(
                                &utterance,
                                IntentDecision::use_tool(request.tool_name(), request.params().clone()),
                            );
                            self.state = DialogueState::Invoking { request };
                        }
                        Ok(None) => {
                            tracing::info!(tool = %tool_name, "interrupted while asking for parameters");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(tool = %tool_name, error = %e, "parameter resolution failed");
                            self.terminal.show(&format!("Sorry, I can't do that: {e}"));
                        }
                    }
                }

                // ── Invoking: bounded remote call ────────────────────────
                DialogueState::Invoking { request } => {
                    let outcome = self.invoker.invoke(&request).await;
                    self.state = DialogueState::Formatting { request, outcome };
                }

                DialogueState::Formatting { request, outcome } => {
                    let text = self.formatter.format(&request, &outcome);
                    self.terminal.show(&text);
                }
            }
        }

        self.terminal.show(GOODBYE);
        if let Some(session) = &self.session {
            tracing::info!(session = %session.session_id, turns = session.turns().len(), "dialogue ended");
        }
    }

    /// `Ok(None)` when the user interrupted one of the questions; the turn
    /// is then abandoned without invoking anything.
    fn resolve(
        &mut self,
        tool_name: &str,
        params: ParamMap,
    ) -> RentClawResult<Option<ToolCallRequest>> {
        let schema = self.registry.get(tool_name)?;
        let terminal = &mut self.terminal;
        let mut interrupted = false;

        let request = self.resolver.resolve(tool_name, params, &self.utterance, |param| {
            if interrupted {
                return String::new();
            }
            let question = schema.question_for(param).unwrap_or(param);
            match terminal.read_line(&format!("{question} ")) {
                UserInput::Line(answer) => answer.trim().to_string(),
                UserInput::Interrupted => {
                    interrupted = true;
                    String::new()
                }
            }
        })?;

        Ok((!interrupted).then_some(request))
    }

    fn record(&mut self, utterance: &str, decision: IntentDecision) {
        if let Some(session) = self.session.as_mut() {
            session.push(utterance, decision);
        }
    }

    fn meta_reply(&self, command: MetaCommand) -> String {
        match command {
            MetaCommand::Help => commands::help_text(&self.registry),
            MetaCommand::History => commands::history_text(self.session.as_ref()),
            MetaCommand::Version => commands::version_text(),
        }
    }
}
