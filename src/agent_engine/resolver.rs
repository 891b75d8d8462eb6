use std::sync::Arc;

use crate::agent_engine::heuristics::HeuristicExtractor;
use crate::agent_engine::state::{ParamMap, ToolCallRequest};
use crate::errors::RentClawResult;
use crate::tools::ToolRegistry;

/// Fills every required parameter of a tool: given values first, then
/// heuristics on the utterance, then the interactive prompt.
pub struct ParamResolver {
    registry: Arc<ToolRegistry>,
    heuristics: Arc<HeuristicExtractor>,
}

impl ParamResolver {
    pub fn new(registry: Arc<ToolRegistry>, heuristics: Arc<HeuristicExtractor>) -> Self {
        Self {
            registry,
            heuristics,
        }
    }

    /// Fails only for an unregistered tool. `prompt` is called once per
    /// still-missing parameter, in schema order, and its answer is taken as-is.
    pub fn resolve<F>(
        &self,
        tool_name: &str,
        partial: ParamMap,
        text: &str,
        mut prompt: F,
    ) -> RentClawResult<ToolCallRequest>
    where
        F: FnMut(&str) -> String,
    {
        let schema = self.registry.get(tool_name)?;
        let mut params = partial;
        let mut guessed: Option<ParamMap> = None;

        for param in &schema.required_params {
            if params.contains_key(param) {
                continue;
            }

            let guesses = guessed.get_or_insert_with(|| self.heuristics.guess_params(text, schema));
            if let Some(value) = guesses.get(param) {
                tracing::debug!(tool = %tool_name, param = %param, value = %value, "filled from heuristics");
                params.insert(param.clone(), value.clone());
                continue;
            }

            let answer = prompt(param);
            tracing::debug!(tool = %tool_name, param = %param, "filled from prompt");
            params.insert(param.clone(), answer);
        }

        Ok(ToolCallRequest::new(tool_name.to_string(), params))
    }
}
