//! Text analysis: fuzzy scoring and term-group matching.

pub mod fuzzy;
mod matcher;

pub use fuzzy::{partial_ratio, PartialScorer};
pub use matcher::{extract_predicates, TermMatcher};
