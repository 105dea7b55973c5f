//! Aggregation of stored artifacts into a search report.

mod types;
mod writer;

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{json, Value};

use crate::analysis::TermMatcher;
use crate::models::{openfda_device_name, MatchOutcome, Negation, TermGroup};
use crate::storage::{read_metadata, read_text, DocumentStore, StorageError};

pub use types::{
    AggregateReport, ProductCount, SearchOptions, DEFAULT_SORT_KEY, MISSING_PRODUCT_CODE,
};
pub use writer::{write_results_json, write_summary};

/// Accumulates match outcomes for one term group.
pub struct Aggregator<'a> {
    matcher: TermMatcher<'a>,
    report: AggregateReport,
    counts: HashMap<String, usize>,
}

impl<'a> Aggregator<'a> {
    pub fn new(group: &'a TermGroup, cutoff: u8) -> Self {
        Self {
            matcher: TermMatcher::new(group, cutoff),
            report: AggregateReport {
                group: group.name.clone(),
                ..AggregateReport::default()
            },
            counts: HashMap::new(),
        }
    }

    /// Walk every artifact under the store. Incomplete artifacts are counted and,
    /// with `purge`, removed; unreadable metadata is logged and skipped.
    pub fn scan(&mut self, store: &DocumentStore, purge: bool) -> Result<(), StorageError> {
        for artifact in store.scan()? {
            if !artifact.is_complete() {
                self.report.total_incomplete += 1;
                if purge {
                    store.purge(&artifact)?;
                    self.report.purged += 1;
                    tracing::debug!("Purged incomplete artifact {}", artifact.k_number);
                }
                continue;
            }

            self.report.total_scanned += 1;
            let metadata = match read_metadata(&artifact) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::error!("{}", e);
                    self.report.total_unreadable += 1;
                    continue;
                }
            };
            let text = match read_text(&artifact) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Cannot read OCR text for {}: {}", artifact.k_number, e);
                    self.report.total_unreadable += 1;
                    continue;
                }
            };

            let outcome = self.matcher.match_document(
                &artifact.k_number,
                &text,
                openfda_device_name(&metadata),
            );
            self.record(metadata, outcome);
        }
        Ok(())
    }

    /// Fold one document's outcome into the report.
    pub fn record(&mut self, mut metadata: Value, outcome: MatchOutcome) {
        if outcome.negated {
            self.report.total_negated += 1;
            if matches!(outcome.negated_by, Some(Negation::DeviceName(_))) {
                self.report.negated_by_device_name += 1;
            }
            return;
        }
        if outcome.hits.is_empty() {
            return;
        }

        tracing::info!("File {}", outcome.document_id);
        for hit in &outcome.hits {
            tracing::info!("    Hit: {}, ratio: {}", hit.term, hit.score);
        }

        let product_code = metadata
            .get("product_code")
            .and_then(Value::as_str)
            .unwrap_or(MISSING_PRODUCT_CODE)
            .to_string();

        if let Some(obj) = metadata.as_object_mut() {
            let hits: Vec<Value> = outcome
                .hits
                .iter()
                .map(|hit| json!([hit.term, hit.score]))
                .collect();
            obj.insert("hits".to_string(), Value::Array(hits));
            if !outcome.predicates.is_empty() {
                obj.insert("predicates".to_string(), json!(outcome.predicates));
            }
        }

        *self.counts.entry(product_code).or_insert(0) += 1;
        self.report.results.push(metadata);
    }

    /// Sort results and per-code counts and hand back the report.
    pub fn finish(mut self, sort_by: &str) -> AggregateReport {
        self.report.sorted_by = sort_results(&mut self.report.results, sort_by);

        let mut counts: Vec<ProductCount> = self
            .counts
            .into_iter()
            .map(|(product_code, count)| ProductCount {
                product_code,
                count,
            })
            .collect();
        counts.sort_by(|a, b| {
            a.count
                .cmp(&b.count)
                .then_with(|| a.product_code.cmp(&b.product_code))
        });
        self.report.counts = counts;
        self.report
    }
}

/// Search the stored artifacts with one term group.
pub fn aggregate(
    store: &DocumentStore,
    group: &TermGroup,
    options: &SearchOptions,
) -> Result<AggregateReport, StorageError> {
    let mut aggregator = Aggregator::new(group, options.cutoff);
    aggregator.scan(store, options.purge)?;
    Ok(aggregator.finish(&options.sort_by))
}

/// Sort by `key`, or by identifier when the first result lacks `key`.
/// Returns the key that was used.
pub fn sort_results(results: &mut [Value], key: &str) -> String {
    let key = match results.first() {
        Some(first) if first.get(key).is_none() => {
            tracing::warn!("Sort key '{}' not present, sorting by {}", key, DEFAULT_SORT_KEY);
            DEFAULT_SORT_KEY
        }
        _ => key,
    };
    results.sort_by(|a, b| {
        compare_values(
            a.get(key).unwrap_or(&Value::Null),
            b.get(key).unwrap_or(&Value::Null),
        )
    });
    key.to_string()
}

/// Total order over JSON scalars: null first, then numbers, then strings; other
/// values compare by their serialized form.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TermHit;

    fn hit_outcome(id: &str, terms: &[(&str, u8)]) -> MatchOutcome {
        let mut outcome = MatchOutcome::new(id);
        outcome.hits = terms
            .iter()
            .map(|(term, score)| TermHit {
                term: term.to_string(),
                score: *score,
            })
            .collect();
        outcome
    }

    #[test]
    fn test_record_merges_hits_and_tallies() {
        let group = TermGroup::bioabsorbable();
        let mut aggregator = Aggregator::new(&group, 80);

        let mut outcome = hit_outcome("K190001", &[("resorbable", 100)]);
        outcome.predicates = vec!["K180002".to_string()];
        aggregator.record(json!({"k_number": "K190001", "product_code": "HWC"}), outcome);
        aggregator.record(
            json!({"k_number": "K190003", "product_code": "HWC"}),
            hit_outcome("K190003", &[("absorbable", 90)]),
        );
        aggregator.record(
            json!({"k_number": "K190002", "product_code": "MBI"}),
            hit_outcome("K190002", &[("absorbable", 85)]),
        );

        let report = aggregator.finish("k_number");
        assert_eq!(report.total_matched(), 3);
        assert_eq!(report.results[0]["hits"], json!([["resorbable", 100]]));
        assert_eq!(report.results[0]["predicates"], json!(["K180002"]));
        assert!(report.results[1].get("predicates").is_none());
        assert_eq!(
            report.counts,
            vec![
                ProductCount {
                    product_code: "MBI".to_string(),
                    count: 1
                },
                ProductCount {
                    product_code: "HWC".to_string(),
                    count: 2
                },
            ]
        );
        let total: usize = report.counts.iter().map(|c| c.count).sum();
        assert_eq!(total, report.results.len());
    }

    #[test]
    fn test_negated_and_empty_outcomes() {
        let group = TermGroup::bioabsorbable();
        let mut aggregator = Aggregator::new(&group, 80);

        let mut negated = hit_outcome("K190001", &[("absorbable", 90)]);
        negated.negate(Negation::DeviceName("suture".to_string()));
        aggregator.record(json!({"k_number": "K190001"}), negated);

        let mut negated = MatchOutcome::new("K190002");
        negated.negate(Negation::Text("suture".to_string()));
        aggregator.record(json!({"k_number": "K190002"}), negated);

        aggregator.record(json!({"k_number": "K190003"}), MatchOutcome::new("K190003"));

        let report = aggregator.finish("k_number");
        assert_eq!(report.total_negated, 2);
        assert_eq!(report.negated_by_device_name, 1);
        assert!(report.results.is_empty());
        assert!(report.counts.is_empty());
    }

    #[test]
    fn test_missing_product_code_is_tallied() {
        let group = TermGroup::bioabsorbable();
        let mut aggregator = Aggregator::new(&group, 80);
        aggregator.record(
            json!({"k_number": "K190001"}),
            hit_outcome("K190001", &[("resorbable", 100)]),
        );
        let report = aggregator.finish("k_number");
        assert_eq!(report.counts[0].product_code, MISSING_PRODUCT_CODE);
    }

    #[test]
    fn test_sort_falls_back_to_identifier() {
        let mut results = vec![
            json!({"k_number": "K190003"}),
            json!({"k_number": "K190001", "decision_date": "2019-01-01"}),
            json!({"k_number": "K190002"}),
        ];
        let used = sort_results(&mut results, "decision_date");
        assert_eq!(used, "k_number");
        let ids: Vec<_> = results.iter().map(|r| r["k_number"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["K190001", "K190002", "K190003"]);
    }

    #[test]
    fn test_sort_by_present_key() {
        let mut results = vec![
            json!({"k_number": "K190001", "decision_date": "2019-05-01"}),
            json!({"k_number": "K190002"}),
            json!({"k_number": "K190003", "decision_date": "2019-02-01"}),
        ];
        let used = sort_results(&mut results, "decision_date");
        assert_eq!(used, "decision_date");
        let ids: Vec<_> = results.iter().map(|r| r["k_number"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["K190002", "K190003", "K190001"]);
    }

    #[test]
    fn test_sort_empty_results() {
        let mut results: Vec<Value> = Vec::new();
        assert_eq!(sort_results(&mut results, "anything"), "anything");
    }
}
