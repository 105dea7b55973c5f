//! Crawl command: catalog paging, OCR and the live hit report.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use super::CrawlArgs;
use crate::cli::helpers::{format_hit_report, OutputSink};
use crate::config::{Settings, DEFAULT_CUTOFF};
use crate::ocr::{require_binaries, OcrConfig, Renderer, TesseractBackend, TextExtractor};
use crate::repository::{CursorStore, SqliteCursorStore};
use crate::scrapers::{CatalogFetcher, DocumentLocator, HttpClient};
use crate::services::{
    CrawlConfig, CrawlEvent, CrawlResult, CrawlService, DocumentOutcome, StopReason, StopSignal,
    SummaryPipeline,
};
use crate::storage::DocumentStore;

/// Crawl the catalog from the saved cursor (with `--restart`) or from the start.
pub async fn cmd_crawl(
    settings: &Settings,
    args: &CrawlArgs,
    stop: StopSignal,
) -> anyhow::Result<()> {
    require_binaries()?;
    let group = settings
        .term_group(&args.group)
        .cloned()
        .with_context(|| {
            format!(
                "Unknown term group '{}' (available: {})",
                args.group,
                settings.group_names().join(", ")
            )
        })?;
    settings.ensure_directories()?;

    let cursor = Arc::new(SqliteCursorStore::new(&settings.database_path())?);
    if args.restart {
        cursor.resume()?;
        eprintln!(
            "{} Resuming at offset {}",
            style("→").cyan(),
            cursor.get()?.offset
        );
    } else {
        cursor.reset()?;
    }

    let client = HttpClient::new(
        &settings.user_agent,
        settings.request_timeout(),
        settings.request_delay(),
        settings.max_retries,
    )?;
    let catalog = CatalogFetcher::new(client.clone(), &settings.api_base);
    let locator = DocumentLocator::new(client.clone(), &settings.detail_base);
    let renderer = Renderer::new(
        client,
        settings.render_dpi,
        settings.ocr_timeout(),
        &settings.scratch_dir,
    );
    let extractor = TextExtractor::new(TesseractBackend::with_config(OcrConfig {
        language: settings.ocr_language.clone(),
        timeout: settings.ocr_timeout(),
    }));
    let store = DocumentStore::new(&settings.documents_dir, settings.bucket_by_year);
    let pipeline = SummaryPipeline::new(locator, renderer, extractor, store, group, DEFAULT_CUTOFF);

    let config = CrawlConfig {
        page_size: args.limit.unwrap_or(settings.page_size).max(1),
        workers: args.workers.unwrap_or(settings.workers).max(1),
        max_pages: args.max_pages,
    };
    eprintln!(
        "{} Crawling {} ({} per page, {} workers)",
        style("→").cyan(),
        settings.api_base,
        config.page_size,
        config.workers
    );

    let sink = OutputSink::open(&args.output, args.append)
        .with_context(|| format!("Cannot open output '{}'", args.output))?;
    let (event_tx, event_rx) = mpsc::channel(256);
    let reporter = tokio::spawn(report_events(event_rx, sink, progress_style()?));

    let service = CrawlService::new(
        Arc::new(catalog),
        Arc::new(pipeline),
        cursor.clone(),
        config,
    );
    let result = service.run(&stop, event_tx).await;
    let _ = reporter.await;

    match result {
        Ok(result) => {
            print_summary(&result);
            if result.stop.is_resumable() {
                eprintln!(
                    "{} Exiting at offset {}. Use --restart (and --append) to continue",
                    style("!").yellow(),
                    result.final_offset
                );
            }
            Ok(())
        }
        Err(e) => {
            let offset = cursor.get().map(|c| c.offset).unwrap_or_default();
            Err(anyhow::Error::new(e)).with_context(|| {
                format!(
                    "Crawl halted at offset {}; rerun with --restart once the upstream recovers",
                    offset
                )
            })
        }
    }
}

fn progress_style() -> anyhow::Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")?
        .progress_chars("█▓░"))
}

/// Drive the progress bar and write matches to the live report.
async fn report_events(
    mut events: mpsc::Receiver<CrawlEvent>,
    mut sink: OutputSink,
    bar_style: ProgressStyle,
) {
    let pb = ProgressBar::new(0);
    pb.set_style(bar_style);

    while let Some(event) = events.recv().await {
        match event {
            CrawlEvent::PageFetched {
                offset,
                records,
                eligible,
                total,
            } => {
                pb.reset();
                pb.set_length(eligible as u64);
                let total = total.map(|t| format!(" of {}", t)).unwrap_or_default();
                pb.set_message(format!(
                    "offset {}{}: {} records, {} with summaries",
                    offset, total, records, eligible
                ));
            }
            CrawlEvent::DocumentStarted { k_number, .. } => {
                pb.set_message(k_number);
            }
            CrawlEvent::DocumentFinished {
                k_number,
                product_code,
                device_name,
                result,
                ..
            } => {
                pb.inc(1);
                let DocumentOutcome::Processed { pages, outcome } = result else {
                    continue;
                };
                if !outcome.is_match() {
                    continue;
                }
                let report =
                    format_hit_report(&k_number, pages, &product_code, &device_name, &outcome.hits);
                let written = if sink.is_stdout() {
                    pb.suspend(|| write_report(&mut sink, &report))
                } else {
                    write_report(&mut sink, &report)
                };
                if let Err(e) = written {
                    tracing::error!("Failed to write hit report: {}", e);
                }
            }
            CrawlEvent::CursorAdvanced { offset } => {
                tracing::debug!("Cursor at {}", offset);
            }
        }
    }

    pb.finish_and_clear();
}

fn write_report(sink: &mut OutputSink, report: &str) -> std::io::Result<()> {
    sink.write_all(report.as_bytes())?;
    sink.flush()
}

fn print_summary(result: &CrawlResult) {
    let tally = &result.tally;
    let status = match result.stop {
        StopReason::Exhausted => style(result.stop.as_str()).green(),
        _ => style(result.stop.as_str()).yellow(),
    };
    eprintln!("\n{} Crawl finished: {}", style("✓").green(), status);
    eprintln!("{:<20} {}", "Pages:", result.pages);
    eprintln!("{:<20} {}", "Records scanned:", result.scanned);
    eprintln!("{:<20} {}", "Without summary:", tally.ineligible);
    eprintln!("{:<20} {}", "Bad identifier:", tally.invalid_identifier);
    eprintln!("{:<20} {}", "Processed:", tally.processed);
    eprintln!("{:<20} {}", "Matched:", tally.matched);
    eprintln!("{:<20} {}", "Already stored:", tally.already_present);
    eprintln!("{:<20} {}", "No summary link:", tally.not_found);
    eprintln!("{:<20} {}", "Incomplete:", tally.incomplete);
    eprintln!("{:<20} {}", "Next offset:", result.final_offset);
}
