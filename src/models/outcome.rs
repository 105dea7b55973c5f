//! Result of scoring one document against a term group.

use serde::{Deserialize, Serialize};

/// A positive term that scored at or above the cutoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermHit {
    pub term: String,
    pub score: u8,
}

/// What negated a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "term", rename_all = "snake_case")]
pub enum Negation {
    /// Exclusion term found in the openFDA device name.
    DeviceName(String),
    /// Exclusion term scored at or above the cutoff in the OCR text.
    Text(String),
}

impl Negation {
    pub fn term(&self) -> &str {
        match self {
            Self::DeviceName(t) | Self::Text(t) => t,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub document_id: String,
    /// Always empty when `negated` is set.
    pub hits: Vec<TermHit>,
    pub negated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negated_by: Option<Negation>,
    /// Other clearance identifiers cited in the text.
    #[serde(default)]
    pub predicates: Vec<String>,
}

impl MatchOutcome {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            hits: Vec::new(),
            negated: false,
            negated_by: None,
            predicates: Vec::new(),
        }
    }

    /// Mark the document as excluded; any accumulated hits are discarded.
    pub fn negate(&mut self, by: Negation) {
        self.hits.clear();
        self.negated = true;
        self.negated_by = Some(by);
    }

    pub fn is_match(&self) -> bool {
        !self.negated && !self.hits.is_empty()
    }
}
