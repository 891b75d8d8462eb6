use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One remote operation the assistant may call, with the parameters the
/// remote side insists on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Order matters: parameters are resolved (and asked for) in this order.
    pub required_params: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
    /// Human question per parameter, shown when the value must be asked for.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub questions: BTreeMap<String, String>,
    /// Extra keywords for the heuristic classifier (config-defined tools).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, required_params: &[&str]) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required_params: required_params.iter().map(|p| p.to_string()).collect(),
            layout: None,
            questions: BTreeMap::new(),
            keywords: Vec::new(),
        }
    }

    pub fn question_for(&self, param: &str) -> Option<&str> {
        self.questions.get(param).map(String::as_str)
    }
}

/// Tool-specific report layouts known to the formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    CarOffers,
    CarDetails,
    BookingConfirmation,
}
