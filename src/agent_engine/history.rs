use crate::agent_engine::state::IntentDecision;

#[derive(Debug, Clone)]
pub struct Turn {
    pub ts: i64,
    pub utterance: String,
    pub decision: IntentDecision,
}

/// Append-only record of earlier turns. Lives in memory for the process
/// lifetime; the classifier only ever borrows it.
#[derive(Debug)]
pub struct SessionContext {
    pub session_id: String,
    turns: Vec<Turn>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            turns: Vec::new(),
        }
    }

    pub fn push(&mut self, utterance: &str, decision: IntentDecision) {
        self.turns.push(Turn {
            ts: chrono::Utc::now().timestamp_millis(),
            utterance: utterance.to_string(),
            decision,
        });
        tracing::debug!(session = %self.session_id, turns = self.turns.len(), "turn recorded");
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent value of `param` in any earlier tool decision.
    pub fn last_param(&self, param: &str) -> Option<&str> {
        self.turns.iter().rev().find_map(|t| t.decision.param(param))
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
