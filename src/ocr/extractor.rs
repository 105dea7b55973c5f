//! Text extraction over rendered page images.

use std::path::PathBuf;

use super::backend::{OcrBackend, OcrError};

/// OCR every page in order and normalize the result into one blob.
pub struct TextExtractor<B: OcrBackend> {
    backend: B,
}

impl<B: OcrBackend> TextExtractor<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub async fn extract(&self, pages: &[PathBuf]) -> Result<String, OcrError> {
        let mut combined = String::new();
        for (index, page) in pages.iter().enumerate() {
            let text = self.backend.ocr_image(page).await?;
            tracing::trace!("{} page {}: {} chars", self.backend.name(), index + 1, text.len());
            combined.push_str(&text);
        }
        Ok(normalize_text(&combined))
    }
}

/// Drop form feeds and rejoin words hyphenated across line breaks. Removal can
/// expose a new break (`a--\n\n`), so this repeats until nothing changes.
pub fn normalize_text(text: &str) -> String {
    let mut text = text.replace('\x0c', "");
    while text.contains("-\n") || text.contains("-\r\n") {
        text = text.replace("-\r\n", "").replace("-\n", "");
    }
    text
}
