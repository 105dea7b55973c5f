//! Search term groups.
//!
//! Terms are written one per entry; a leading `!` marks an exclusion term that
//! negates the whole document when it matches.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Marker prefix for exclusion terms in the textual form.
pub const NEGATION_PREFIX: char = '!';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Negative,
}

/// A single probe term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub text: String,
    pub polarity: Polarity,
}

impl Term {
    pub fn positive(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            polarity: Polarity::Positive,
        }
    }

    pub fn negative(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            polarity: Polarity::Negative,
        }
    }

    /// Parse the textual form (`"absorbable"`, `"!suture"`).
    ///
    /// Returns `None` for blank entries.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (text, polarity) = match raw.strip_prefix(NEGATION_PREFIX) {
            Some(rest) => (rest.trim(), Polarity::Negative),
            None => (raw, Polarity::Positive),
        };
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            polarity,
        })
    }

    pub fn is_negative(&self) -> bool {
        self.polarity == Polarity::Negative
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.polarity {
            Polarity::Positive => write!(f, "{}", self.text),
            Polarity::Negative => write!(f, "{}{}", NEGATION_PREFIX, self.text),
        }
    }
}

/// Named, ordered list of terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermGroup {
    pub name: String,
    pub terms: Vec<Term>,
}

impl TermGroup {
    /// Build a group from textual entries, dropping blanks.
    pub fn from_entries<S: AsRef<str>>(name: &str, entries: &[S]) -> Self {
        Self {
            name: name.to_string(),
            terms: entries.iter().filter_map(|e| Term::parse(e.as_ref())).collect(),
        }
    }

    /// Build a group from a term file: one entry per line, `#` starts a comment line.
    pub fn from_lines(name: &str, contents: &str) -> Self {
        let entries: Vec<&str> = contents
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .collect();
        Self::from_entries(name, &entries)
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn negative_terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.iter().filter(|t| t.is_negative())
    }

    /// Additive manufacturing vocabulary.
    pub fn additive_manufacturing() -> Self {
        Self::from_entries(
            "AM",
            &[
                "additive",
                "additively",
                "additive manufactured",
                "additive manufacturing",
                "3d print",
                "stereolithography",
                "stereolithographic",
                "powder fusion",
                "powder bed fusion",
                "fdm",
                "fff",
                "slf",
                "dlp",
                "sla",
                "laser sintering",
            ],
        )
    }

    /// Bioabsorbable materials, excluding sutures and explicitly non-degradable devices.
    pub fn bioabsorbable() -> Self {
        Self::from_entries(
            "BE",
            &[
                "bioabsorbable",
                "resorbable",
                "biodegradable",
                "absorbable",
                "!suture",
                "!nondegradable",
                "!non degradable",
                "!nonabsorbable",
                "!non absorbable",
            ],
        )
    }

    /// Groups that ship with the binary.
    pub fn builtin() -> Vec<Self> {
        vec![Self::additive_manufacturing(), Self::bioabsorbable()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_polarity() {
        assert_eq!(Term::parse("absorbable"), Some(Term::positive("absorbable")));
        assert_eq!(Term::parse("!suture"), Some(Term::negative("suture")));
        assert_eq!(Term::parse("  ! non absorbable "), Some(Term::negative("non absorbable")));
        assert_eq!(Term::parse("   "), None);
        assert_eq!(Term::parse("!"), None);
    }

    #[test]
    fn test_display_roundtrips_marker() {
        assert_eq!(Term::negative("suture").to_string(), "!suture");
        assert_eq!(Term::positive("sla").to_string(), "sla");
    }

    #[test]
    fn test_from_lines_skips_comments_and_blanks() {
        let group = TermGroup::from_lines("custom", "# header\nporous\n\n!metal\n");
        assert_eq!(
            group.terms,
            vec![Term::positive("porous"), Term::negative("metal")]
        );
        assert_eq!(group.negative_terms().count(), 1);
    }

    #[test]
    fn test_builtin_groups() {
        let groups = TermGroup::builtin();
        assert_eq!(groups.len(), 2);
        let be = TermGroup::bioabsorbable();
        assert_eq!(be.terms.len(), 9);
        assert_eq!(be.negative_terms().count(), 5);
        assert!(TermGroup::additive_manufacturing()
            .terms
            .iter()
            .all(|t| !t.is_negative()));
    }
}
