//! Download a summary PDF and rasterize its pages.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;

use crate::scrapers::{HttpClient, UpstreamError};

const PDF_MIME: &str = "application/pdf";
const PDF_FILENAME: &str = "document.pdf";
const PAGE_PREFIX: &str = "page";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("{url} is not a PDF (detected {detected})")]
    NotPdf { url: String, detected: String },

    #[error("pdftoppm failed: {0}")]
    Rasterize(String),

    #[error("pdftoppm produced no pages for {0}")]
    NoPages(String),

    #[error("Rendering timed out after {0}s")]
    Timeout(u64),

    #[error("pdftoppm not found (install poppler-utils)")]
    ToolMissing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Page images of one document. The backing directory is removed on drop.
pub struct RenderedDocument {
    _dir: TempDir,
    pub pages: Vec<PathBuf>,
}

impl RenderedDocument {
    /// Take ownership of a scratch directory and the page images inside it.
    pub fn from_dir(dir: TempDir) -> std::io::Result<Self> {
        let pages = collect_pages(dir.path())?;
        Ok(Self { _dir: dir, pages })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Turns a summary document URL into ordered page images.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn fetch_and_render(&self, url: &str) -> Result<RenderedDocument, RenderError>;
}

/// Fetches documents and turns them into page images with `pdftoppm`.
#[derive(Clone)]
pub struct Renderer {
    client: HttpClient,
    dpi: u32,
    timeout: Duration,
    scratch_dir: PathBuf,
}

impl Renderer {
    pub fn new(
        client: HttpClient,
        dpi: u32,
        timeout: Duration,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            dpi,
            timeout,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Render a downloaded document. The PDF is written to a fresh directory
    /// under the scratch root and deleted once the page images exist.
    pub async fn render_bytes(
        &self,
        url: &str,
        bytes: &[u8],
    ) -> Result<RenderedDocument, RenderError> {
        let detected = infer::get(bytes).map(|kind| kind.mime_type());
        if detected != Some(PDF_MIME) {
            return Err(RenderError::NotPdf {
                url: url.to_string(),
                detected: detected.unwrap_or("unknown").to_string(),
            });
        }

        let dir = tempfile::Builder::new()
            .prefix("fda-miner-")
            .tempdir_in(&self.scratch_dir)?;
        let pdf_path = dir.path().join(PDF_FILENAME);
        tokio::fs::write(&pdf_path, bytes).await?;

        self.rasterize(&pdf_path, dir.path()).await?;
        tokio::fs::remove_file(&pdf_path).await?;

        let rendered = RenderedDocument::from_dir(dir)?;
        if rendered.pages.is_empty() {
            return Err(RenderError::NoPages(url.to_string()));
        }
        tracing::debug!("Rendered {} page(s) from {}", rendered.page_count(), url);
        Ok(rendered)
    }

    async fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<(), RenderError> {
        let dpi = self.dpi.to_string();
        let child = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi])
            .arg(pdf_path)
            .arg(out_dir.join(PAGE_PREFIX))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Err(_) => return Err(RenderError::Timeout(self.timeout.as_secs())),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::ToolMissing)
            }
            Ok(result) => result?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::Rasterize(stderr.trim().to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PageRenderer for Renderer {
    async fn fetch_and_render(&self, url: &str) -> Result<RenderedDocument, RenderError> {
        let bytes = self.client.get_bytes(url).await?;
        self.render_bytes(url, &bytes).await
    }
}

/// Page images in `dir`, ordered by page number. pdftoppm zero-pads the
/// number to the width of the page count (`page-1.png`, `page-01.png`, ...).
fn collect_pages(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut pages: Vec<(u32, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(number) = page_number(&path) {
            pages.push((number, path));
        }
    }
    pages.sort_by_key(|(number, _)| *number);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

fn page_number(path: &Path) -> Option<u32> {
    if path.extension()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.strip_prefix(PAGE_PREFIX)?.strip_prefix('-')?;
    digits.parse().ok()
}
