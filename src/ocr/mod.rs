//! Rendering and OCR.
//!
//! Summary PDFs are rasterized with `pdftoppm` and each page image is read with
//! Tesseract. Both tools are external binaries checked at startup.

mod backend;
mod extractor;
mod render;
mod tesseract;
mod tools;

pub use backend::{OcrBackend, OcrConfig, OcrError};
pub use extractor::{normalize_text, TextExtractor};
pub use render::{PageRenderer, RenderError, RenderedDocument, Renderer};
pub use tesseract::TesseractBackend;
pub use tools::{check_binary, require_binaries};
