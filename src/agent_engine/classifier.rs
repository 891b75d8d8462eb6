//! Intent classification: ask the oracle, fall back to heuristics.
//!
//! `classify` is total. Every oracle failure (timeout, transport error,
//! garbage output, hallucinated tool) ends in the heuristic path, which
//! always produces a decision.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::agent_engine::heuristics::HeuristicExtractor;
use crate::agent_engine::history::SessionContext;
use crate::agent_engine::state::{IntentDecision, ParamMap};
use crate::errors::{RentClawError, RentClawResult};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage};
use crate::tools::ToolRegistry;

const SYSTEM_PROMPT: &str = "\
You are a rental car support assistant. Decide whether one of the tools below \
fits the user's request.

Reply with exactly one line in one of these two forms:
TOOL:<tool_name> PARAMS:<json object with the parameters you can fill>
FRIENDLY_NO_TOOL:<a short friendly reply asking what the user needs>

Only use tool names from the list. Leave out parameters the user did not give. \
Dates are YYYY-MM-DD.";

/// Which path produced a decision; logged, and exposed for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOrigin {
    Oracle,
    Heuristic,
}

pub struct IntentClassifier {
    registry: Arc<ToolRegistry>,
    heuristics: Arc<HeuristicExtractor>,
    oracle: Option<(Arc<dyn LlmProvider>, CallConfig)>,
    timeout: Duration,
    prompt_turns: usize,
    tool_re: Regex,
    decline_re: Regex,
}

impl IntentClassifier {
    pub fn new(
        registry: Arc<ToolRegistry>,
        heuristics: Arc<HeuristicExtractor>,
        timeout: Duration,
    ) -> RentClawResult<Self> {
        let tool_re = Regex::new(r"(?ims)^[ \t]*TOOL:\s*([A-Za-z0-9_\-]+)(?:\s*PARAMS:\s*(.*))?")
            .map_err(|e| RentClawError::Config(format!("invalid tool pattern: {e}")))?;
        let decline_re = Regex::new(r"(?is)FRIENDLY_NO_TOOL:\s*(.*)")
            .map_err(|e| RentClawError::Config(format!("invalid decline pattern: {e}")))?;
        Ok(Self {
            registry,
            heuristics,
            oracle: None,
            timeout,
            prompt_turns: 5,
            tool_re,
            decline_re,
        })
    }

    /// Without an oracle every turn goes straight to the heuristics.
    pub fn with_oracle(mut self, provider: Arc<dyn LlmProvider>, cfg: CallConfig) -> Self {
        self.oracle = Some((provider, cfg));
        self
    }

    pub fn with_prompt_turns(mut self, turns: usize) -> Self {
        self.prompt_turns = turns;
        self
    }

    pub async fn classify(&self, text: &str, context: Option<&SessionContext>) -> IntentDecision {
        self.classify_traced(text, context).await.0
    }

    pub async fn classify_traced(
        &self,
        text: &str,
        context: Option<&SessionContext>,
    ) -> (IntentDecision, DecisionOrigin) {
        match self.consult_oracle(text, context).await {
            Ok(decision) => {
                tracing::debug!(?decision, "oracle decision");
                (decision, DecisionOrigin::Oracle)
            }
            Err(e) => {
                tracing::warn!(error = %e, "oracle unusable, falling back to heuristics");
                (self.heuristic_decision(text, context), DecisionOrigin::Heuristic)
            }
        }
    }

    async fn consult_oracle(
        &self,
        text: &str,
        context: Option<&SessionContext>,
    ) -> RentClawResult<IntentDecision> {
        let Some((provider, cfg)) = &self.oracle else {
            return Err(RentClawError::Oracle("no oracle configured".into()));
        };

        let messages = vec![
            ChatMessage::system(self.build_system_prompt()),
            ChatMessage::user(self.build_user_prompt(text, context)),
        ];

        let raw = match tokio::time::timeout(self.timeout, provider.complete(messages, cfg)).await {
            Ok(result) => result?,
            Err(_) => return Err(RentClawError::OracleTimeout(self.timeout.as_secs())),
        };
        self.parse_reply(&raw)
    }

    fn build_system_prompt(&self) -> String {
        let mut prompt = String::from(SYSTEM_PROMPT);
        prompt.push_str("\n\nTools:\n");
        for schema in self.registry.schemas() {
            prompt.push_str(&format!(
                "- {}({}): {}\n",
                schema.name,
                schema.required_params.join(", "),
                schema.description
            ));
        }
        prompt
    }

    fn build_user_prompt(&self, text: &str, context: Option<&SessionContext>) -> String {
        let mut prompt = String::new();
        if let Some(ctx) = context.filter(|c| !c.is_empty()) {
            prompt.push_str("Earlier in this conversation:\n");
            for turn in ctx.recent(self.prompt_turns) {
                prompt.push_str(&format!("User: {}\n", turn.utterance));
                prompt.push_str(&format!("Decision: {}\n", render_decision(&turn.decision)));
            }
            prompt.push('\n');
        }
        prompt.push_str(&format!("Request: {text}"));
        prompt
    }

    /// Match the oracle's reply against the two fixed shapes.
    fn parse_reply(&self, raw: &str) -> RentClawResult<IntentDecision> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RentClawError::UnparseableOracleOutput("empty reply".into()));
        }

        if let Some(caps) = self.decline_re.captures(raw) {
            let message = caps[1].trim();
            if message.is_empty() {
                return Err(RentClawError::UnparseableOracleOutput(
                    "empty FRIENDLY_NO_TOOL message".into(),
                ));
            }
            return Ok(IntentDecision::decline(message));
        }

        if let Some(caps) = self.tool_re.captures(raw) {
            let name = &caps[1];
            if !self.registry.is_registered(name) {
                return Err(RentClawError::UnparseableOracleOutput(format!(
                    "unregistered tool '{name}'"
                )));
            }
            let params = match caps.get(2) {
                Some(m) => parse_params(m.as_str())?,
                None => ParamMap::new(),
            };
            return Ok(IntentDecision::use_tool(name, params));
        }

        // Neither shape: the oracle just talked. Show it as-is.
        Ok(IntentDecision::decline(raw))
    }

    fn heuristic_decision(&self, text: &str, context: Option<&SessionContext>) -> IntentDecision {
        let guessed = self
            .heuristics
            .guess_tool(text)
            .and_then(|name| self.registry.get(&name).ok());

        let Some(schema) = guessed else {
            return IntentDecision::decline(self.generic_help());
        };

        let mut params = self.heuristics.guess_params(text, schema);

        if let Some(ctx) = context {
            if self.heuristics.mentions_reference(text) {
                for param in &schema.required_params {
                    if params.contains_key(param) {
                        continue;
                    }
                    if let Some(value) = ctx.last_param(param) {
                        tracing::debug!(param = %param, value = %value, "carried over from context");
                        params.insert(param.clone(), value.to_string());
                    }
                }
            }
        }

        IntentDecision::use_tool(schema.name.clone(), params)
    }

    /// Fixed reply when neither the oracle nor the heuristics found a tool.
    pub fn generic_help(&self) -> String {
        let tools: Vec<String> = self
            .registry
            .schemas()
            .iter()
            .map(|s| {
                if s.description.is_empty() {
                    s.name.clone()
                } else {
                    format!("{} ({})", s.name, s.description.to_lowercase())
                }
            })
            .collect();
        format!(
            "I'm not sure what you need. I can help with: {}.",
            tools.join("; ")
        )
    }
}

/// Parse the first JSON value after `PARAMS:`; trailing text is ignored.
fn parse_params(raw: &str) -> RentClawResult<ParamMap> {
    let mut stream = serde_json::Deserializer::from_str(raw.trim()).into_iter::<serde_json::Value>();
    let value = match stream.next() {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            return Err(RentClawError::UnparseableOracleOutput(format!(
                "malformed PARAMS json: {e}"
            )))
        }
        None => return Ok(ParamMap::new()),
    };

    let serde_json::Value::Object(map) = value else {
        return Err(RentClawError::UnparseableOracleOutput(
            "PARAMS is not a JSON object".into(),
        ));
    };

    let mut params = ParamMap::new();
    for (key, value) in map {
        let text = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        params.insert(key, text);
    }
    Ok(params)
}

fn render_decision(decision: &IntentDecision) -> String {
    match decision {
        IntentDecision::UseTool { tool_name, params } => format!(
            "TOOL:{} PARAMS:{}",
            tool_name,
            serde_json::to_string(params).unwrap_or_default()
        ),
        IntentDecision::Decline { message } => format!("FRIENDLY_NO_TOOL:{message}"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Oracle stand-in returning a scripted result and recording prompts.
    pub(crate) struct ScriptedOracle {
        reply: Mutex<Option<RentClawResult<String>>>,
        delay: Duration,
        pub(crate) seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedOracle {
        pub(crate) fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(Ok(text.to_string()))),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn failing(err: RentClawError) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(Err(err))),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(Ok("TOOL:search_cars PARAMS:{}".to_string()))),
                delay,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedOracle {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, messages: Vec<ChatMessage>, _cfg: &CallConfig) -> RentClawResult<String> {
            self.seen.lock().unwrap().push(messages);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(RentClawError::Oracle("script exhausted".into())))
        }
    }

    fn cfg() -> CallConfig {
        CallConfig {
            model: "test".into(),
            temperature: 0.0,
        }
    }

    fn classifier(oracle: Option<Arc<ScriptedOracle>>) -> IntentClassifier {
        let c = IntentClassifier::new(
            Arc::new(ToolRegistry::builtin().unwrap()),
            Arc::new(HeuristicExtractor::builtin().unwrap()),
            Duration::from_secs(20),
        )
        .unwrap();
        match oracle {
            Some(o) => c.with_oracle(o, cfg()),
            None => c,
        }
    }

    fn params(pairs: &[(&str, &str)]) -> ParamMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn oracle_tool_reply_is_used() {
        let c = classifier(Some(ScriptedOracle::replying(
            r#"TOOL:get_car_details PARAMS:{"car_id":"CAR002"}"#,
        )));
        let (decision, origin) = c.classify_traced("tell me about the bmw", None).await;
        assert_eq!(origin, DecisionOrigin::Oracle);
        assert_eq!(
            decision,
            IntentDecision::use_tool("get_car_details", params(&[("car_id", "CAR002")]))
        );
    }

    #[tokio::test]
    async fn oracle_reply_with_noise_and_scalars() {
        let c = classifier(Some(ScriptedOracle::replying(
            "Sure!\ntool: search_cars PARAMS: {\"location\": \"Berlin\", \"start_date\": null, \"days\": 3} hope that helps",
        )));
        let decision = c.classify("cars in berlin", None).await;
        assert_eq!(
            decision,
            IntentDecision::use_tool("search_cars", params(&[("location", "Berlin"), ("days", "3")]))
        );
    }

    #[tokio::test]
    async fn tool_without_params_yields_empty_map() {
        let c = classifier(Some(ScriptedOracle::replying("TOOL:book_car")));
        let decision = c.classify("I want to book", None).await;
        assert_eq!(decision, IntentDecision::use_tool("book_car", ParamMap::new()));
    }

    #[tokio::test]
    async fn friendly_no_tool_becomes_decline() {
        let c = classifier(Some(ScriptedOracle::replying(
            "FRIENDLY_NO_TOOL: Hello! Do you want to search, look up or book a car?",
        )));
        let (decision, origin) = c.classify_traced("hi", None).await;
        assert_eq!(origin, DecisionOrigin::Oracle);
        assert_eq!(
            decision,
            IntentDecision::decline("Hello! Do you want to search, look up or book a car?")
        );
    }

    #[tokio::test]
    async fn unshaped_reply_passes_through_verbatim() {
        let c = classifier(Some(ScriptedOracle::replying("sure, I can help!")));
        let (decision, origin) = c.classify_traced("book the golf", None).await;
        assert_eq!(origin, DecisionOrigin::Oracle);
        assert_eq!(decision, IntentDecision::decline("sure, I can help!"));
    }

    #[tokio::test]
    async fn tool_word_inside_prose_is_not_a_tool_line() {
        let reply = "Hmm, I'm not sure which tool: could you tell me more about what you need?";
        let c = classifier(Some(ScriptedOracle::replying(reply)));
        let (decision, origin) = c.classify_traced("hello", None).await;
        assert_eq!(origin, DecisionOrigin::Oracle);
        assert_eq!(decision, IntentDecision::decline(reply));
    }

    #[tokio::test]
    async fn malformed_json_falls_back_to_heuristics() {
        let c = classifier(Some(ScriptedOracle::replying(
            r#"TOOL:get_car_details PARAMS:{"car_id": CAR002"#,
        )));
        let (decision, origin) = c.classify_traced("details for the mercedes", None).await;
        assert_eq!(origin, DecisionOrigin::Heuristic);
        assert_eq!(
            decision,
            IntentDecision::use_tool("get_car_details", params(&[("car_id", "CAR003")]))
        );
    }

    #[tokio::test]
    async fn non_object_params_fall_back() {
        let c = classifier(Some(ScriptedOracle::replying(r#"TOOL:get_car_details PARAMS:["CAR002"]"#)));
        let (_, origin) = c.classify_traced("details for the mercedes", None).await;
        assert_eq!(origin, DecisionOrigin::Heuristic);
    }

    #[tokio::test]
    async fn hallucinated_tool_falls_back() {
        let c = classifier(Some(ScriptedOracle::replying("TOOL:launch_rocket PARAMS:{}")));
        let (decision, origin) = c.classify_traced("search cars in Köln", None).await;
        assert_eq!(origin, DecisionOrigin::Heuristic);
        assert_eq!(
            decision,
            IntentDecision::use_tool("search_cars", params(&[("location", "Köln")]))
        );
    }

    #[tokio::test]
    async fn empty_reply_falls_back() {
        let c = classifier(Some(ScriptedOracle::replying("   \n")));
        let (_, origin) = c.classify_traced("hello", None).await;
        assert_eq!(origin, DecisionOrigin::Heuristic);
    }

    #[tokio::test]
    async fn oracle_error_without_keywords_gives_generic_help() {
        let c = classifier(Some(ScriptedOracle::failing(RentClawError::Oracle(
            "connection refused".into(),
        ))));
        let decision = c.classify("what's the weather?", None).await;
        match decision {
            IntentDecision::Decline { message } => {
                assert_eq!(message, c.generic_help());
                assert!(message.contains("search_cars"));
                assert!(message.contains("get_car_details"));
                assert!(message.contains("book_car"));
            }
            other => panic!("expected decline, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_oracle_times_out_into_heuristics() {
        let oracle = ScriptedOracle::slow(Duration::from_secs(60));
        let c = classifier(Some(oracle.clone()));
        let (decision, origin) = c.classify_traced("book the bmw", None).await;
        assert_eq!(origin, DecisionOrigin::Heuristic);
        assert_eq!(
            decision,
            IntentDecision::use_tool("book_car", params(&[("car_id", "CAR002")]))
        );
        assert_eq!(oracle.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_oracle_means_heuristics_only() {
        let c = classifier(None);
        let (decision, origin) = c.classify_traced("search available cars in Berlin", None).await;
        assert_eq!(origin, DecisionOrigin::Heuristic);
        assert_eq!(
            decision,
            IntentDecision::use_tool("search_cars", params(&[("location", "Berlin")]))
        );
    }

    #[tokio::test]
    async fn prompt_lists_tools_and_recent_turns() {
        let oracle = ScriptedOracle::replying("FRIENDLY_NO_TOOL: ok");
        let c = classifier(Some(oracle.clone())).with_prompt_turns(1);
        let mut ctx = SessionContext::new();
        ctx.push("details golf", IntentDecision::use_tool("get_car_details", params(&[("car_id", "CAR001")])));
        ctx.push("details bmw", IntentDecision::use_tool("get_car_details", params(&[("car_id", "CAR002")])));

        c.classify("book that car", Some(&ctx)).await;

        let seen = oracle.seen.lock().unwrap();
        let system = &seen[0][0].content;
        let user = &seen[0][1].content;
        assert!(system.contains("TOOL:<tool_name> PARAMS:"));
        assert!(system.contains("FRIENDLY_NO_TOOL:"));
        assert!(system.contains("- search_cars(location, start_date, end_date)"));
        assert!(system.contains("- book_car(car_id, customer_name, start_date)"));
        assert!(user.contains(r#"TOOL:get_car_details PARAMS:{"car_id":"CAR002"}"#));
        assert!(!user.contains("CAR001"));
        assert!(user.ends_with("Request: book that car"));
    }

    #[tokio::test]
    async fn fallback_carries_reference_from_context() {
        let c = classifier(None);
        let mut ctx = SessionContext::new();
        ctx.push("details bmw", IntentDecision::use_tool("get_car_details", params(&[("car_id", "CAR002")])));

        let decision = c.classify("book that car", Some(&ctx)).await;
        assert_eq!(
            decision,
            IntentDecision::use_tool("book_car", params(&[("car_id", "CAR002")]))
        );

        // Stateless: nothing to carry over.
        let decision = c.classify("book that car", None).await;
        assert_eq!(decision, IntentDecision::use_tool("book_car", ParamMap::new()));
    }

    #[tokio::test]
    async fn classify_is_total_over_odd_inputs() {
        let replies = ["", "TOOL:", "PARAMS:{}", "FRIENDLY_NO_TOOL:", "TOOL:book_car PARAMS:{", "\u{0}\u{1}"];
        for reply in replies {
            let c = classifier(Some(ScriptedOracle::replying(reply)));
            for text in ["", "   ", "book", "ßüö 🚗", "2025-12-01"] {
                let _ = c.classify(text, None).await;
            }
        }
    }
}
