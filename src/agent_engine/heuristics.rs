//! Oracle-free intent and parameter guesses from plain substring matching.
//!
//! Everything here is a pure function of the input text: the same utterance
//! always produces the same guesses.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Deserialize;

use crate::agent_engine::state::ParamMap;
use crate::errors::{RentClawError, RentClawResult};
use crate::tools::ToolSchema;

#[derive(Debug, Clone, Deserialize)]
pub struct Vocabulary {
    /// Checked in order; the first group with a matching keyword wins.
    pub keyword_groups: Vec<KeywordGroup>,
    /// Parameter name → known values with their aliases.
    #[serde(default)]
    pub entities: BTreeMap<String, Vec<Entity>>,
    /// Parameters filled from ISO dates, in order of appearance.
    #[serde(default)]
    pub date_params: Vec<String>,
    /// Phrases pointing back at something said earlier ("that car").
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordGroup {
    pub tool: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entity {
    pub value: String,
    pub aliases: Vec<String>,
}

pub struct HeuristicExtractor {
    vocab: Vocabulary,
    date_re: Regex,
}

impl HeuristicExtractor {
    /// Vocabulary from prompts/tools/vocabulary.json, embedded at compile time.
    pub fn builtin() -> RentClawResult<Self> {
        let json = include_str!("../../prompts/tools/vocabulary.json");
        let vocab: Vocabulary = serde_json::from_str(json)
            .map_err(|e| RentClawError::Config(format!("Failed to parse vocabulary: {e}")))?;
        Self::from_vocabulary(vocab)
    }

    pub fn from_vocabulary(mut vocab: Vocabulary) -> RentClawResult<Self> {
        for group in &mut vocab.keyword_groups {
            lowercase_all(&mut group.keywords);
        }
        for entity in vocab.entities.values_mut().flatten() {
            lowercase_all(&mut entity.aliases);
            // The canonical value is always its own alias ("CAR002" in text).
            let own = entity.value.to_lowercase();
            if !entity.aliases.contains(&own) {
                entity.aliases.push(own);
            }
        }
        lowercase_all(&mut vocab.references);

        let date_re = Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b")
            .map_err(|e| RentClawError::Config(format!("invalid date pattern: {e}")))?;
        Ok(Self { vocab, date_re })
    }

    /// Appends a keyword group after the built-in ones.
    pub fn with_keyword_group(mut self, tool: &str, keywords: &[String]) -> Self {
        if !keywords.is_empty() {
            let mut keywords = keywords.to_vec();
            lowercase_all(&mut keywords);
            self.vocab.keyword_groups.push(KeywordGroup {
                tool: tool.to_string(),
                keywords,
            });
        }
        self
    }

    pub fn guess_tool(&self, text: &str) -> Option<String> {
        let lower = text.to_lowercase();
        self.vocab
            .keyword_groups
            .iter()
            .find(|group| group.keywords.iter().any(|k| lower.contains(k.as_str())))
            .map(|group| group.tool.clone())
    }

    /// Whichever of the tool's required parameters can be recognized in `text`.
    pub fn guess_params(&self, text: &str, schema: &ToolSchema) -> ParamMap {
        let lower = text.to_lowercase();
        let mut params = ParamMap::new();

        for param in &schema.required_params {
            let Some(entities) = self.vocab.entities.get(param) else {
                continue;
            };
            let hit = entities
                .iter()
                .find(|e| e.aliases.iter().any(|a| lower.contains(a.as_str())));
            if let Some(entity) = hit {
                params.insert(param.clone(), entity.value.clone());
            }
        }

        let wanted = self
            .vocab
            .date_params
            .iter()
            .filter(|p| schema.required_params.contains(p));
        let dates = self.date_re.captures_iter(text).map(|c| c[1].to_string());
        for (param, date) in wanted.zip(dates) {
            params.insert(param.clone(), date);
        }

        params
    }

    pub fn mentions_reference(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.vocab
            .references
            .iter()
            .any(|r| lower.contains(r.as_str()))
    }

    /// Tools named in keyword groups, for the startup consistency check.
    pub fn keyword_tools(&self) -> impl Iterator<Item = &str> {
        self.vocab.keyword_groups.iter().map(|g| g.tool.as_str())
    }
}

fn lowercase_all(words: &mut [String]) {
    for w in words.iter_mut() {
        *w = w.to_lowercase();
    }
}
