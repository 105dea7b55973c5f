//! Report output: the JSON result list and the human-readable summary.

use std::io::Write;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use super::AggregateReport;
use crate::repository::DeviceLookup;

const JSON_INDENT: &[u8] = b"     ";
const UNKNOWN_DEVICE: &str = "unknown";

/// Matched records as a pretty-printed JSON list.
pub fn write_results_json<W: Write>(report: &AggregateReport, out: &mut W) -> std::io::Result<()> {
    let formatter = PrettyFormatter::with_indent(JSON_INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut *out, formatter);
    report
        .results
        .serialize(&mut serializer)
        .map_err(std::io::Error::other)?;
    writeln!(out)?;
    out.flush()
}

/// Totals and per-code counts, with device names from the product-code lookup.
pub fn write_summary<W: Write>(
    report: &AggregateReport,
    lookup: &dyn DeviceLookup,
    out: &mut W,
) -> std::io::Result<()> {
    writeln!(out, "Search group: {}", report.group)?;
    writeln!(out, "Total folders scanned: {}", report.total_scanned)?;
    writeln!(out, "Number of hits is {}", report.total_matched())?;
    writeln!(
        out,
        "Number discarded to negative hits {} ({} by device name)",
        report.total_negated, report.negated_by_device_name
    )?;
    if report.total_unreadable != 0 {
        writeln!(out, "Unreadable metadata records: {}", report.total_unreadable)?;
    }
    if report.total_incomplete != 0 {
        writeln!(out, "There were {} empty folders", report.total_incomplete)?;
        if report.purged != 0 {
            writeln!(out, "Purged {} of them", report.purged)?;
        }
        writeln!(out)?;
    }
    writeln!(out, "Count by product code")?;
    for entry in &report.counts {
        let device_name = lookup
            .device_name(&entry.product_code)
            .unwrap_or_else(|| UNKNOWN_DEVICE.to_string());
        writeln!(
            out,
            "        Product code={}: {:04}  {}",
            entry.product_code, entry.count, device_name
        )?;
    }
    out.flush()
}
