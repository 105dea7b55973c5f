//! fda-miner - resumable deep search of FDA 510(k) summaries.
//!
//! Pages through the openFDA clearance catalog, OCRs each published summary,
//! and scores the text against configurable term groups.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod models;
pub mod ocr;
pub mod repository;
pub mod scrapers;
pub mod services;
pub mod storage;
