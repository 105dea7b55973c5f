//! External tool discovery.

use super::backend::OcrError;

/// Binaries the render and OCR stages shell out to, with install hints.
pub const REQUIRED_BINARIES: [(&str, &str); 2] = [
    ("pdftoppm", "install poppler-utils"),
    ("tesseract", "install tesseract-ocr"),
];

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Fail with the first missing tool.
pub fn require_binaries() -> Result<(), OcrError> {
    for (name, hint) in REQUIRED_BINARIES {
        if !check_binary(name) {
            return Err(OcrError::BackendNotAvailable(format!(
                "{} not found in PATH ({})",
                name, hint
            )));
        }
    }
    Ok(())
}
