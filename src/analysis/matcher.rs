//! Term-group matching and cross-reference extraction.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::fuzzy::PartialScorer;
use crate::models::{MatchOutcome, Negation, TermGroup, TermHit};

/// Clearance identifiers cited in running text: one capital letter, six digits.
static PREDICATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]\d{6}\b").expect("valid predicate regex"));

/// Scores documents against one term group.
#[derive(Debug, Clone)]
pub struct TermMatcher<'a> {
    group: &'a TermGroup,
    cutoff: u8,
}

impl<'a> TermMatcher<'a> {
    pub fn new(group: &'a TermGroup, cutoff: u8) -> Self {
        Self { group, cutoff }
    }

    /// Score OCR text. Terms are evaluated in group order; the first exclusion term
    /// at or above the cutoff negates the document and ends evaluation.
    pub fn match_text(&self, document_id: &str, text: &str) -> MatchOutcome {
        let mut outcome = MatchOutcome::new(document_id);
        outcome.predicates = extract_predicates(text, document_id);

        let scorer = PartialScorer::new(&text.to_lowercase());
        for term in &self.group.terms {
            let score = scorer.score(&term.text.to_lowercase());
            if score < self.cutoff {
                continue;
            }
            if term.is_negative() {
                tracing::info!(
                    "{} content negated by '{}' (score {})",
                    document_id,
                    term.text,
                    score
                );
                outcome.negate(Negation::Text(term.text.clone()));
                break;
            }
            outcome.hits.push(TermHit {
                term: term.text.clone(),
                score,
            });
        }
        outcome
    }

    /// Score a stored document. Exclusion terms are first checked against the
    /// harmonized device name, which is cheaper and more reliable than OCR text.
    pub fn match_document(
        &self,
        document_id: &str,
        text: &str,
        device_name: Option<&str>,
    ) -> MatchOutcome {
        if let Some(name) = device_name {
            let name = name.to_lowercase();
            if let Some(term) = self
                .group
                .negative_terms()
                .find(|t| name.contains(&t.text.to_lowercase()))
            {
                tracing::info!(
                    "{} negated device name '{}' by '{}'",
                    document_id,
                    name,
                    term.text
                );
                let mut outcome = MatchOutcome::new(document_id);
                outcome.predicates = extract_predicates(text, document_id);
                outcome.negate(Negation::DeviceName(term.text.clone()));
                return outcome;
            }
        }
        self.match_text(document_id, text)
    }
}

/// Identifiers of other clearances mentioned in the text, in order of first
/// appearance, without duplicates and without the document's own identifier.
pub fn extract_predicates(text: &str, own_id: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    PREDICATE_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|id| *id != own_id && seen.insert(*id))
        .map(str::to_string)
        .collect()
}
