//! The production document pipeline.

use std::time::Instant;

use async_trait::async_trait;

use super::{DocumentOutcome, DocumentPipeline, PipelineError};
use crate::analysis::TermMatcher;
use crate::models::{ResultRecord, TermGroup};
use crate::ocr::{OcrBackend, PageRenderer, RenderError, TextExtractor};
use crate::scrapers::{Located, Locator};
use crate::storage::DocumentStore;

/// Locate the summary, render and OCR it, persist the artifact, and score the
/// text against the crawl's term group.
pub struct SummaryPipeline<L, R, B: OcrBackend> {
    locator: L,
    renderer: R,
    extractor: TextExtractor<B>,
    store: DocumentStore,
    group: TermGroup,
    cutoff: u8,
}

impl<L: Locator, R: PageRenderer, B: OcrBackend> SummaryPipeline<L, R, B> {
    pub fn new(
        locator: L,
        renderer: R,
        extractor: TextExtractor<B>,
        store: DocumentStore,
        group: TermGroup,
        cutoff: u8,
    ) -> Self {
        Self {
            locator,
            renderer,
            extractor,
            store,
            group,
            cutoff,
        }
    }

    fn incomplete(
        &self,
        k_number: &str,
        reason: String,
    ) -> Result<DocumentOutcome, PipelineError> {
        tracing::warn!("{}: {}", k_number, reason);
        self.store.mark_incomplete(k_number)?;
        Ok(DocumentOutcome::Incomplete { reason })
    }
}

#[async_trait]
impl<L: Locator, R: PageRenderer, B: OcrBackend> DocumentPipeline for SummaryPipeline<L, R, B> {
    async fn process(&self, record: &ResultRecord) -> Result<DocumentOutcome, PipelineError> {
        let k_number = record.k_number.as_str();
        if self.store.is_complete(k_number) {
            tracing::debug!("{}: artifact already complete", k_number);
            return Ok(DocumentOutcome::AlreadyPresent);
        }

        let url = match self.locator.resolve(record).await? {
            Located::Found(url) => url,
            Located::NotFound => return Ok(DocumentOutcome::NotFound),
        };

        let start = Instant::now();
        self.store.prepare(k_number)?;

        let rendered = match self.renderer.fetch_and_render(&url).await {
            Ok(rendered) => rendered,
            Err(RenderError::Upstream(e)) => return Err(e.into()),
            Err(e) => return self.incomplete(k_number, e.to_string()),
        };

        let text = match self.extractor.extract(&rendered.pages).await {
            Ok(text) => text,
            Err(e) => return self.incomplete(k_number, e.to_string()),
        };
        let pages = rendered.page_count();
        drop(rendered);

        self.store.append_text(k_number, &text)?;
        self.store.write_metadata(record)?;

        tracing::info!(
            "File {} {} pages, processing time is {:.0} seconds",
            k_number,
            pages,
            start.elapsed().as_secs_f64()
        );

        let outcome = TermMatcher::new(&self.group, self.cutoff).match_document(
            k_number,
            &text,
            record.openfda_device_name(),
        );
        Ok(DocumentOutcome::Processed { pages, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{OcrError, RenderedDocument};
    use crate::scrapers::UpstreamError;
    use crate::services::Aggregator;
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use tempfile::{tempdir, TempDir};

    struct NoSummary;

    #[async_trait]
    impl Locator for NoSummary {
        async fn resolve(&self, _record: &ResultRecord) -> Result<Located, UpstreamError> {
            Ok(Located::NotFound)
        }
    }

    struct DetailPageDown;

    #[async_trait]
    impl Locator for DetailPageDown {
        async fn resolve(&self, record: &ResultRecord) -> Result<Located, UpstreamError> {
            Err(UpstreamError::Timeout {
                url: format!("fake://detail?ID={}", record.k_number),
                attempts: 4,
            })
        }
    }

    struct SummaryLink;

    #[async_trait]
    impl Locator for SummaryLink {
        async fn resolve(&self, record: &ResultRecord) -> Result<Located, UpstreamError> {
            Ok(Located::Found(format!("fake://pdf/{}.pdf", record.k_number)))
        }
    }

    /// What the fake renderer does with every document.
    enum Render {
        NotPdf,
        Rasterize,
        Pages(usize),
    }

    /// Renders into directories under `scratch` so tests can check cleanup.
    struct FakeRenderer {
        scratch: PathBuf,
        mode: Render,
    }

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn fetch_and_render(&self, url: &str) -> Result<RenderedDocument, RenderError> {
            let dir = TempDir::new_in(&self.scratch)?;
            std::fs::write(dir.path().join("document.pdf"), b"%PDF-1.4")?;
            match self.mode {
                Render::NotPdf => Err(RenderError::NotPdf {
                    url: url.to_string(),
                    detected: "text/html".to_string(),
                }),
                Render::Rasterize => Err(RenderError::Rasterize("Syntax Error".to_string())),
                Render::Pages(count) => {
                    std::fs::remove_file(dir.path().join("document.pdf"))?;
                    for page in 1..=count {
                        std::fs::write(dir.path().join(format!("page-{}.png", page)), b"")?;
                    }
                    Ok(RenderedDocument::from_dir(dir)?)
                }
            }
        }
    }

    /// Returns fixed text per page; fails on any page listed in `fail_on`.
    struct ScriptedOcr {
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl OcrBackend for ScriptedOcr {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn ocr_image(&self, image_path: &Path) -> Result<String, OcrError> {
            let stem = image_path.file_stem().unwrap().to_string_lossy().to_string();
            if self.fail_on == Some(stem.as_str()) {
                return Err(OcrError::OcrFailed(stem));
            }
            match stem.as_str() {
                "page-1" => Ok("A resorb-\nable interference screw. ".to_string()),
                _ => Ok("Predicate device K180002.\x0c".to_string()),
            }
        }
    }

    fn pipeline<L: Locator>(
        locator: L,
        renderer: FakeRenderer,
        fail_on: Option<&'static str>,
        store: DocumentStore,
    ) -> SummaryPipeline<L, FakeRenderer, ScriptedOcr> {
        SummaryPipeline::new(
            locator,
            renderer,
            TextExtractor::new(ScriptedOcr { fail_on }),
            store,
            TermGroup::bioabsorbable(),
            80,
        )
    }

    fn renderer(scratch: &Path, mode: Render) -> FakeRenderer {
        FakeRenderer {
            scratch: scratch.to_path_buf(),
            mode,
        }
    }

    fn record() -> ResultRecord {
        ResultRecord::from_value(json!({
            "k_number": "K190001",
            "product_code": "HWC",
            "statement_or_summary": "Summary"
        }))
        .unwrap()
    }

    fn is_empty_dir(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_existing_artifact_is_skipped() {
        let dir = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let store = DocumentStore::new(dir.path(), false);
        store.prepare("K190001").unwrap();
        store.append_text("K190001", "text").unwrap();
        store.write_metadata(&record()).unwrap();

        let result = pipeline(DetailPageDown, renderer(scratch.path(), Render::Pages(1)), None, store)
            .process(&record())
            .await
            .unwrap();
        assert!(matches!(result, DocumentOutcome::AlreadyPresent));
    }

    #[tokio::test]
    async fn test_missing_summary_link() {
        let dir = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let store = DocumentStore::new(dir.path(), false);

        let result = pipeline(NoSummary, renderer(scratch.path(), Render::Pages(1)), None, store.clone())
            .process(&record())
            .await
            .unwrap();
        assert!(matches!(result, DocumentOutcome::NotFound));
        assert!(!store.artifact_dir("K190001").exists());
    }

    #[tokio::test]
    async fn test_detail_page_failure_is_fatal() {
        let dir = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let store = DocumentStore::new(dir.path(), false);

        let result = pipeline(DetailPageDown, renderer(scratch.path(), Render::Pages(1)), None, store)
            .process(&record())
            .await;
        assert!(matches!(result, Err(PipelineError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_processed_document_is_stored_and_matched() {
        let dir = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let store = DocumentStore::new(dir.path(), false);

        let result = pipeline(SummaryLink, renderer(scratch.path(), Render::Pages(2)), None, store.clone())
            .process(&record())
            .await
            .unwrap();

        let DocumentOutcome::Processed { pages, outcome } = result else {
            panic!("expected a processed document");
        };
        assert_eq!(pages, 2);
        assert!(outcome.is_match());
        assert_eq!(outcome.predicates, vec!["K180002".to_string()]);
        assert!(store.is_complete("K190001"));
        let text = std::fs::read_to_string(store.artifact_dir("K190001").join("out_text.txt")).unwrap();
        assert_eq!(text, "A resorbable interference screw. Predicate device K180002.");
        assert!(is_empty_dir(scratch.path()));
    }

    async fn assert_left_incomplete(mode: Render, fail_on: Option<&'static str>) {
        let dir = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let store = DocumentStore::new(dir.path(), false);

        let result = pipeline(SummaryLink, renderer(scratch.path(), mode), fail_on, store.clone())
            .process(&record())
            .await
            .unwrap();
        assert!(matches!(result, DocumentOutcome::Incomplete { .. }));

        // Empty artifact directory left behind, scratch space released.
        let artifact = store.artifact_dir("K190001");
        assert!(artifact.is_dir());
        assert!(is_empty_dir(&artifact));
        assert!(is_empty_dir(scratch.path()));

        let group = TermGroup::bioabsorbable();
        let mut aggregator = Aggregator::new(&group, 80);
        aggregator.scan(&store, false).unwrap();
        let report = aggregator.finish("k_number");
        assert_eq!(report.total_incomplete, 1);
        assert_eq!(report.total_scanned, 0);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_non_pdf_leaves_incomplete_artifact() {
        assert_left_incomplete(Render::NotPdf, None).await;
    }

    #[tokio::test]
    async fn test_rasterize_failure_leaves_incomplete_artifact() {
        assert_left_incomplete(Render::Rasterize, None).await;
    }

    #[tokio::test]
    async fn test_ocr_failure_leaves_incomplete_artifact() {
        assert_left_incomplete(Render::Pages(2), Some("page-2")).await;
    }
}
