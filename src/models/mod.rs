//! Data models for the 510(k) miner.

mod cursor;
mod outcome;
mod record;
mod terms;

pub use cursor::{CrawlCursor, RunState};
pub use outcome::{MatchOutcome, Negation, TermHit};
pub use record::{openfda_device_name, ResultRecord, HAS_SUMMARY};
pub use terms::{Polarity, Term, TermGroup};
