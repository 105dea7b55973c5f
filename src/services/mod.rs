//! Service layer for the miner.
//!
//! This module contains the crawl and report logic separated from UI concerns.
//! Services emit events or return reports; the CLI decides how to present them.

pub mod crawl;
pub mod report;
mod stop;

pub use crawl::{
    CrawlConfig, CrawlEvent, CrawlResult, CrawlService, DocumentOutcome, DocumentPipeline,
    PipelineError, StopReason, SummaryPipeline,
};
pub use report::{aggregate, AggregateReport, Aggregator, SearchOptions};
pub use stop::StopSignal;
