//! Crawl service types and events.

use thiserror::Error;

use crate::models::MatchOutcome;
use crate::repository::RepositoryError;
use crate::scrapers::UpstreamError;
use crate::storage::StorageError;

/// Errors that halt the crawl. The cursor is never advanced past a page that
/// produced one of these.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cursor store error: {0}")]
    Cursor(#[from] RepositoryError),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// What happened to one eligible record.
#[derive(Debug, Clone)]
pub enum DocumentOutcome {
    /// OCR text and metadata written; carries the live match against the crawl group.
    Processed { pages: usize, outcome: MatchOutcome },
    /// A complete artifact already existed from an earlier run.
    AlreadyPresent,
    /// The detail page has no summary link.
    NotFound,
    /// Rendering or OCR failed; the artifact directory is left incomplete.
    Incomplete { reason: String },
}

/// Events emitted during a crawl.
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    PageFetched {
        offset: u64,
        records: usize,
        eligible: usize,
        total: Option<u64>,
    },
    DocumentStarted {
        worker_id: usize,
        k_number: String,
    },
    DocumentFinished {
        worker_id: usize,
        k_number: String,
        product_code: String,
        device_name: String,
        result: DocumentOutcome,
    },
    CursorAdvanced {
        offset: u64,
    },
}

/// Why the crawl loop ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// The catalog returned an empty page.
    #[default]
    Exhausted,
    /// STOP was set in the cursor store.
    StopRequested,
    /// SIGINT/SIGTERM.
    Interrupted,
    /// `--max-pages` reached.
    PageLimit,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Exhausted => "catalog exhausted",
            StopReason::StopRequested => "stop requested",
            StopReason::Interrupted => "interrupted",
            StopReason::PageLimit => "page limit reached",
        }
    }

    /// Whether running again would pick up more work.
    pub fn is_resumable(&self) -> bool {
        !matches!(self, StopReason::Exhausted)
    }
}

/// Per-page document tallies, summed into the crawl result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageTally {
    pub eligible: usize,
    pub ineligible: usize,
    /// Summary records skipped because `k_number` is not a clearance identifier.
    pub invalid_identifier: usize,
    pub processed: usize,
    pub matched: usize,
    pub already_present: usize,
    pub not_found: usize,
    pub incomplete: usize,
}

impl PageTally {
    pub fn count(&mut self, result: &DocumentOutcome) {
        match result {
            DocumentOutcome::Processed { outcome, .. } => {
                self.processed += 1;
                if outcome.is_match() {
                    self.matched += 1;
                }
            }
            DocumentOutcome::AlreadyPresent => self.already_present += 1,
            DocumentOutcome::NotFound => self.not_found += 1,
            DocumentOutcome::Incomplete { .. } => self.incomplete += 1,
        }
    }

    pub fn merge(&mut self, other: &PageTally) {
        self.eligible += other.eligible;
        self.ineligible += other.ineligible;
        self.invalid_identifier += other.invalid_identifier;
        self.processed += other.processed;
        self.matched += other.matched;
        self.already_present += other.already_present;
        self.not_found += other.not_found;
        self.incomplete += other.incomplete;
    }
}

/// Result of a crawl run.
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    pub pages: u64,
    pub scanned: usize,
    pub tally: PageTally,
    pub final_offset: u64,
    pub stop: StopReason,
}

/// Configuration for the crawl service.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub page_size: u32,
    pub workers: usize,
    pub max_pages: Option<u64>,
}
