//! Catalog result records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value of `statement_or_summary` for clearances that published a summary document.
pub const HAS_SUMMARY: &str = "Summary";

/// Placeholder shown for optional upstream fields that were absent.
const MISSING: &str = "missing";

/// One entry of the 510(k) catalog.
///
/// Only the fields the pipeline reads are typed; everything upstream sent is kept
/// in `raw` so the metadata record can be written out verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Clearance identifier, e.g. `K123456`.
    pub k_number: String,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub applicant: Option<String>,
    #[serde(default)]
    pub advisory_committee: Option<String>,
    #[serde(default)]
    pub advisory_committee_description: Option<String>,
    #[serde(default)]
    pub statement_or_summary: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

impl ResultRecord {
    /// Build a record from one element of the catalog `results` array.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let mut record: ResultRecord = serde_json::from_value(value.clone())?;
        record.raw = value;
        Ok(record)
    }

    /// Whether the clearance published a summary document we can fetch.
    pub fn has_summary(&self) -> bool {
        self.statement_or_summary.as_deref() == Some(HAS_SUMMARY)
    }

    pub fn product_code(&self) -> &str {
        self.product_code.as_deref().unwrap_or(MISSING)
    }

    pub fn device_name(&self) -> &str {
        self.device_name.as_deref().unwrap_or(MISSING)
    }

    pub fn applicant(&self) -> &str {
        self.applicant.as_deref().unwrap_or(MISSING)
    }

    pub fn advisory_committee(&self) -> &str {
        self.advisory_committee.as_deref().unwrap_or(MISSING)
    }

    pub fn advisory_committee_description(&self) -> &str {
        self.advisory_committee_description
            .as_deref()
            .unwrap_or(MISSING)
    }

    /// Device name as harmonized by openFDA (`openfda.device_name`).
    pub fn openfda_device_name(&self) -> Option<&str> {
        openfda_device_name(&self.raw)
    }
}

/// Read `openfda.device_name` out of a raw metadata object.
pub fn openfda_device_name(raw: &Value) -> Option<&str> {
    raw.get("openfda")
        .and_then(|o| o.get("device_name"))
        .and_then(Value::as_str)
}
