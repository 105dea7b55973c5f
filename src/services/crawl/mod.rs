//! Resumable crawl over the clearance catalog.
//!
//! Pages are fetched at the cursor offset; the eligible records of a page are fed
//! through a channel to a fixed pool of workers, and the cursor advances only once
//! every worker has finished. Stop requests are honored between pages.

mod pipeline;
mod types;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::models::ResultRecord;
use crate::repository::CursorStore;
use crate::scrapers::{Catalog, CatalogPage};
use crate::services::StopSignal;
use crate::storage::is_identifier;

pub use pipeline::SummaryPipeline;
pub use types::{
    CrawlConfig, CrawlEvent, CrawlResult, DocumentOutcome, PageTally, PipelineError, StopReason,
};

/// Per-record processing: locate, render, OCR, store, match.
#[async_trait]
pub trait DocumentPipeline: Send + Sync {
    async fn process(&self, record: &ResultRecord) -> Result<DocumentOutcome, PipelineError>;
}

/// Service driving the crawl loop.
pub struct CrawlService<C, P, S> {
    catalog: Arc<C>,
    pipeline: Arc<P>,
    cursor: Arc<S>,
    config: CrawlConfig,
}

impl<C, P, S> CrawlService<C, P, S>
where
    C: Catalog + 'static,
    P: DocumentPipeline + 'static,
    S: CursorStore + 'static,
{
    pub fn new(catalog: Arc<C>, pipeline: Arc<P>, cursor: Arc<S>, config: CrawlConfig) -> Self {
        Self {
            catalog,
            pipeline,
            cursor,
            config,
        }
    }

    /// Run until the catalog is exhausted, a stop is requested, or an upstream
    /// failure halts the crawl.
    pub async fn run(
        &self,
        stop: &StopSignal,
        event_tx: mpsc::Sender<CrawlEvent>,
    ) -> Result<CrawlResult, PipelineError> {
        let mut result = CrawlResult::default();
        let mut catalog_total: Option<u64> = None;

        loop {
            let cursor = self.cursor.get()?;
            result.final_offset = cursor.offset;

            if stop.is_cancelled() {
                result.stop = StopReason::Interrupted;
                break;
            }
            if cursor.stop_requested() {
                result.stop = StopReason::StopRequested;
                break;
            }
            if self.config.max_pages.is_some_and(|max| result.pages >= max) {
                result.stop = StopReason::PageLimit;
                break;
            }
            // openFDA answers 404 rather than an empty page once skip passes the total.
            if catalog_total.is_some_and(|total| cursor.offset >= total) {
                tracing::info!("Offset {} reached catalog total", cursor.offset);
                result.stop = StopReason::Exhausted;
                break;
            }

            let page = self
                .catalog
                .fetch_page(cursor.offset, self.config.page_size)
                .await?;
            if page.is_empty() {
                tracing::info!("Empty page at offset {}, catalog exhausted", cursor.offset);
                result.stop = StopReason::Exhausted;
                break;
            }
            catalog_total = page.total.or(catalog_total);
            if let Some(hint) = page.next_offset_hint {
                let expected = cursor.offset + page.records.len() as u64;
                if hint != expected {
                    tracing::debug!("Link header suggests skip={}, using {}", hint, expected);
                }
            }

            let tally = self.process_page(&page, cursor.offset, &event_tx).await?;
            result.scanned += page.records.len();
            result.tally.merge(&tally);

            let advanced = self.cursor.advance(page.records.len() as u64)?;
            result.final_offset = advanced.offset;
            result.pages += 1;
            let _ = event_tx
                .send(CrawlEvent::CursorAdvanced {
                    offset: advanced.offset,
                })
                .await;
        }

        Ok(result)
    }

    async fn process_page(
        &self,
        page: &CatalogPage,
        offset: u64,
        event_tx: &mpsc::Sender<CrawlEvent>,
    ) -> Result<PageTally, PipelineError> {
        let (eligible, invalid): (Vec<ResultRecord>, Vec<ResultRecord>) = page
            .eligible()
            .cloned()
            .partition(|record| is_identifier(&record.k_number));
        for record in &invalid {
            tracing::warn!("Skipping record with malformed k_number {:?}", record.k_number);
        }
        let mut tally = PageTally {
            eligible: eligible.len(),
            ineligible: page.records.len() - eligible.len() - invalid.len(),
            invalid_identifier: invalid.len(),
            ..PageTally::default()
        };

        let _ = event_tx
            .send(CrawlEvent::PageFetched {
                offset,
                records: page.records.len(),
                eligible: eligible.len(),
                total: page.total,
            })
            .await;

        if eligible.is_empty() {
            return Ok(tally);
        }

        let (record_tx, record_rx) = mpsc::channel(eligible.len());
        for record in eligible {
            // Capacity equals the record count, so this never waits.
            let _ = record_tx.send(record).await;
        }
        drop(record_tx);

        let record_rx = Arc::new(Mutex::new(record_rx));
        let halted = Arc::new(AtomicBool::new(false));
        let first_error: Arc<StdMutex<Option<PipelineError>>> = Arc::new(StdMutex::new(None));

        let workers = self.config.workers.max(1);
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let pipeline = self.pipeline.clone();
            let record_rx = record_rx.clone();
            let halted = halted.clone();
            let first_error = first_error.clone();
            let event_tx = event_tx.clone();

            let handle = tokio::spawn(async move {
                let mut worker_tally = PageTally::default();
                loop {
                    if halted.load(Ordering::SeqCst) {
                        break;
                    }
                    let next = record_rx.lock().await.recv().await;
                    let Some(record) = next else {
                        break;
                    };

                    let _ = event_tx
                        .send(CrawlEvent::DocumentStarted {
                            worker_id,
                            k_number: record.k_number.clone(),
                        })
                        .await;

                    match pipeline.process(&record).await {
                        Ok(result) => {
                            worker_tally.count(&result);
                            let _ = event_tx
                                .send(CrawlEvent::DocumentFinished {
                                    worker_id,
                                    k_number: record.k_number.clone(),
                                    product_code: record.product_code().to_string(),
                                    device_name: record.device_name().to_string(),
                                    result,
                                })
                                .await;
                        }
                        Err(e) => {
                            tracing::error!("{}: {}", record.k_number, e);
                            halted.store(true, Ordering::SeqCst);
                            let mut slot = match first_error.lock() {
                                Ok(guard) => guard,
                                Err(poisoned) => poisoned.into_inner(),
                            };
                            slot.get_or_insert(e);
                            break;
                        }
                    }
                }
                worker_tally
            });

            handles.push(handle);
        }

        // Wait for every worker, even after one has died.
        let mut join_error = None;
        for handle in handles {
            match handle.await {
                Ok(worker_tally) => tally.merge(&worker_tally),
                Err(e) => {
                    tracing::error!("Worker task failed: {}", e);
                    halted.store(true, Ordering::SeqCst);
                    join_error.get_or_insert(PipelineError::Worker(e.to_string()));
                }
            }
        }

        let error = match first_error.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match error.or(join_error) {
            Some(e) => Err(e),
            None => Ok(tally),
        }
    }
}
