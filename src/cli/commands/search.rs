//! Search command: aggregate stored artifacts into `.json` and `.dat` reports.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context};
use console::style;

use super::SearchArgs;
use crate::cli::helpers::{report_paths, OutputSink};
use crate::config::Settings;
use crate::models::TermGroup;
use crate::repository::{DeviceLookup, ProductCodeRepository};
use crate::services::report::{write_results_json, write_summary};
use crate::services::{aggregate, SearchOptions};
use crate::storage::DocumentStore;

pub async fn cmd_search(settings: &Settings, args: &SearchArgs) -> anyhow::Result<()> {
    if !settings.documents_dir.is_dir() {
        bail!(
            "Cannot find the folder {}",
            settings.documents_dir.display()
        );
    }
    let group = resolve_group(settings, args.search.as_deref(), args.file.as_deref())?;

    let store = DocumentStore::new(&settings.documents_dir, settings.bucket_by_year);
    let options = SearchOptions {
        cutoff: args.cutoff,
        purge: args.purge,
        sort_by: args.sortby.clone(),
    };
    let report = aggregate(&store, &group, &options)?;

    let lookup: Box<dyn DeviceLookup> = match ProductCodeRepository::open(&settings.products_db) {
        Some(repo) => Box::new(repo),
        None => {
            tracing::warn!(
                "Product code database {} not found; device names will be unknown",
                settings.products_db.display()
            );
            Box::new(HashMap::<String, String>::new())
        }
    };

    match report_paths(&args.output) {
        None => {
            let mut out = OutputSink::open(&args.output, false)?;
            write_results_json(&report, &mut out)?;
            write_summary(&report, &*lookup, &mut out)?;
        }
        Some((json_path, dat_path)) => {
            let mut out = OutputSink::open_file(&json_path, false)
                .with_context(|| format!("Cannot write {}", json_path.display()))?;
            write_results_json(&report, &mut out)?;
            out.flush()?;

            let mut out = OutputSink::open_file(&dat_path, false)
                .with_context(|| format!("Cannot write {}", dat_path.display()))?;
            write_summary(&report, &*lookup, &mut out)?;
            out.flush()?;

            eprintln!(
                "{} {} matches from {} folders written to {} and {}",
                style("✓").green(),
                report.total_matched(),
                report.total_scanned,
                json_path.display(),
                dat_path.display()
            );
        }
    }

    Ok(())
}

/// Term group from `--search` (a configured group) or `--file` (one term per line).
pub fn resolve_group(
    settings: &Settings,
    search: Option<&str>,
    file: Option<&Path>,
) -> anyhow::Result<TermGroup> {
    match (search, file) {
        (Some(_), Some(_)) => bail!("Cannot have both file and search parameters"),
        (None, None) => bail!("One of --search or --file is required"),
        (Some(name), None) => settings.term_group(name).cloned().with_context(|| {
            format!(
                "Search type {} is not a valid key (available: {})",
                name,
                settings.group_names().join(", ")
            )
        }),
        (None, Some(path)) => {
            if !path.is_file() {
                bail!("Search terms file {} not found", path.display());
            }
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read {}", path.display()))?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "file".to_string());
            let group = TermGroup::from_lines(&name, &contents);
            if group.is_empty() {
                bail!("Search terms file {} is empty", path.display());
            }
            Ok(group)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_named_group() {
        let settings = Settings::default();
        let group = resolve_group(&settings, Some("be"), None).unwrap();
        assert_eq!(group.name, "BE");
        assert!(resolve_group(&settings, Some("XX"), None).is_err());
    }

    #[test]
    fn test_resolve_rejects_both_or_neither() {
        let settings = Settings::default();
        assert!(resolve_group(&settings, Some("BE"), Some(Path::new("t.txt"))).is_err());
        assert!(resolve_group(&settings, None, None).is_err());
    }

    #[test]
    fn test_resolve_term_file() {
        let dir = tempdir().unwrap();
        let settings = Settings::default();

        let terms = dir.path().join("polymers.txt");
        std::fs::write(&terms, "# polymers\nresorbable\n!suture\n").unwrap();
        let group = resolve_group(&settings, None, Some(&terms)).unwrap();
        assert_eq!(group.name, "polymers");
        assert_eq!(group.terms.len(), 2);
        assert!(group.terms[1].is_negative());

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "\n  \n").unwrap();
        assert!(resolve_group(&settings, None, Some(&empty)).is_err());

        let missing = dir.path().join("missing.txt");
        assert!(resolve_group(&settings, None, Some(&missing)).is_err());
    }
}
