//! Aggregate report types.

use serde::Serialize;
use serde_json::Value;

/// Field results are sorted by when the requested key is absent.
pub const DEFAULT_SORT_KEY: &str = "k_number";
/// Product code used when a record has none.
pub const MISSING_PRODUCT_CODE: &str = "missing";

/// Options for a search over stored artifacts.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub cutoff: u8,
    /// Delete incomplete artifact directories while scanning.
    pub purge: bool,
    pub sort_by: String,
}

/// Matched documents for one product code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductCount {
    pub product_code: String,
    pub count: usize,
}

/// Outcome of aggregating the artifact tree against one term group.
#[derive(Debug, Clone, Default)]
pub struct AggregateReport {
    pub group: String,
    /// Matched metadata records with `hits` and `predicates` merged in.
    pub results: Vec<Value>,
    /// Ascending by count.
    pub counts: Vec<ProductCount>,
    /// Sort key actually applied to `results`.
    pub sorted_by: String,
    /// Complete artifacts examined.
    pub total_scanned: usize,
    pub total_negated: usize,
    /// Subset of `total_negated` excluded by the device name rather than the text.
    pub negated_by_device_name: usize,
    pub total_incomplete: usize,
    pub total_unreadable: usize,
    pub purged: usize,
}

impl AggregateReport {
    pub fn total_matched(&self) -> usize {
        self.results.len()
    }
}
