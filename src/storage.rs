//! On-disk layout of per-document artifacts.
//!
//! Each clearance gets one directory, `{documents_dir}/[{year}/]{k_number}/`, holding
//! exactly two files once processing completes: the OCR text and the metadata record.
//! Any other file count marks the artifact as incomplete.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::models::ResultRecord;

pub const OCR_TEXT_FILENAME: &str = "out_text.txt";
pub const METADATA_FILENAME: &str = "data.txt";
/// Number of files in a complete artifact directory.
pub const ARTIFACT_FILE_COUNT: usize = 2;
/// Placeholder written over registration identifiers.
pub const REDACTED: &str = "REDACTED";

const REDACTED_FIELDS: [&str; 2] = ["registration_number", "fei_number"];
/// Characters of context shown either side of a metadata parse error.
const ERROR_CONTEXT_CHARS: usize = 20;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z](\d{2})\d{4}$").expect("valid identifier regex"));

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot parse metadata for {k_number} at line {line} column {column}: {message} (near: {context:?})")]
    MetadataParse {
        k_number: String,
        line: usize,
        column: usize,
        message: String,
        context: String,
    },

    #[error("Metadata for {0} has no JSON block")]
    MetadataMissingJson(String),

    #[error("Not a clearance identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Failed to serialize metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Whether a directory name looks like a clearance identifier.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Four-digit submission year embedded in an identifier (`K98xxxx` → 1998).
pub fn year_bucket(k_number: &str) -> Option<String> {
    let caps = IDENTIFIER_RE.captures(k_number)?;
    let two_digits = &caps[1];
    let yy: u32 = two_digits.parse().ok()?;
    let century = if yy > 75 { "19" } else { "20" };
    Some(format!("{}{}", century, two_digits))
}

/// An artifact directory found while scanning storage.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    pub k_number: String,
    pub path: PathBuf,
    pub file_count: usize,
}

impl ArtifactDir {
    pub fn is_complete(&self) -> bool {
        self.file_count == ARTIFACT_FILE_COUNT
            && self.path.join(OCR_TEXT_FILENAME).is_file()
            && self.path.join(METADATA_FILENAME).is_file()
    }

    pub fn text_path(&self) -> PathBuf {
        self.path.join(OCR_TEXT_FILENAME)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.path.join(METADATA_FILENAME)
    }
}

/// Artifact storage rooted at the documents directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
    bucket_by_year: bool,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>, bucket_by_year: bool) -> Self {
        Self {
            root: root.into(),
            bucket_by_year,
        }
    }

    /// Directory for one identifier.
    pub fn artifact_dir(&self, k_number: &str) -> PathBuf {
        match (self.bucket_by_year, year_bucket(k_number)) {
            (true, Some(year)) => self.root.join(year).join(k_number),
            _ => self.root.join(k_number),
        }
    }

    /// Whether a completed artifact already exists for this identifier.
    pub fn is_complete(&self, k_number: &str) -> bool {
        let path = self.artifact_dir(k_number);
        match count_files(&path) {
            Ok(file_count) => ArtifactDir {
                k_number: k_number.to_string(),
                path,
                file_count,
            }
            .is_complete(),
            Err(_) => false,
        }
    }

    /// Create an empty artifact directory, removing leftovers of an earlier
    /// interrupted attempt so the text file is never appended to twice.
    pub fn prepare(&self, k_number: &str) -> Result<PathBuf, StorageError> {
        if !is_identifier(k_number) {
            return Err(StorageError::InvalidIdentifier(k_number.to_string()));
        }
        let dir = self.artifact_dir(k_number);
        fs::create_dir_all(&dir)?;
        for name in [OCR_TEXT_FILENAME, METADATA_FILENAME] {
            remove_if_exists(&dir.join(name))?;
        }
        Ok(dir)
    }

    /// Append OCR text for a document.
    pub fn append_text(&self, k_number: &str, text: &str) -> Result<(), StorageError> {
        let path = self.artifact_dir(k_number).join(OCR_TEXT_FILENAME);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Write the metadata record. This is the last file written, so its presence
    /// completes the artifact.
    pub fn write_metadata(&self, record: &ResultRecord) -> Result<(), StorageError> {
        let path = self.artifact_dir(&record.k_number).join(METADATA_FILENAME);
        let contents = format_metadata(record)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Drop partial output, leaving the directory in the incomplete state.
    pub fn mark_incomplete(&self, k_number: &str) -> Result<(), StorageError> {
        let dir = self.artifact_dir(k_number);
        for name in [OCR_TEXT_FILENAME, METADATA_FILENAME] {
            remove_if_exists(&dir.join(name))?;
        }
        Ok(())
    }

    /// Find every artifact directory under the root, including year buckets.
    /// Results are ordered by identifier.
    pub fn scan(&self) -> Result<Vec<ArtifactDir>, StorageError> {
        let mut found = Vec::new();
        self.scan_dir(&self.root, 0, &mut found)?;
        found.sort_by(|a, b| a.k_number.cmp(&b.k_number));
        Ok(found)
    }

    fn scan_dir(
        &self,
        dir: &Path,
        depth: usize,
        found: &mut Vec<ArtifactDir>,
    ) -> Result<(), StorageError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if is_identifier(&name) {
                found.push(ArtifactDir {
                    k_number: name,
                    file_count: count_files(&path)?,
                    path,
                });
            } else if depth == 0 && name.len() == 4 && name.chars().all(|c| c.is_ascii_digit()) {
                self.scan_dir(&path, depth + 1, found)?;
            }
        }
        Ok(())
    }

    /// Remove an artifact directory and everything in it.
    pub fn purge(&self, artifact: &ArtifactDir) -> Result<(), StorageError> {
        fs::remove_dir_all(&artifact.path)?;
        Ok(())
    }
}

fn count_files(dir: &Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        if entry?.file_type()?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Copy of the upstream record with registration identifiers replaced.
pub fn redacted_metadata(raw: &Value) -> Value {
    let mut value = raw.clone();
    redact_fields(&mut value);
    if let Some(openfda) = value.get_mut("openfda") {
        redact_fields(openfda);
    }
    value
}

fn redact_fields(value: &mut Value) {
    if let Some(obj) = value.as_object_mut() {
        for field in REDACTED_FIELDS {
            if let Some(v) = obj.get_mut(field) {
                *v = Value::String(REDACTED.to_string());
            }
        }
    }
}

/// Render the `data.txt` contents: a readable header followed by the JSON record.
pub fn format_metadata(record: &ResultRecord) -> Result<String, StorageError> {
    let json = serde_json::to_string_pretty(&redacted_metadata(&record.raw))?;
    Ok(format!(
        "Product Code = {}\n\
         Applicant = {}\n\
         Device name = {}\n\
         Advisory Committee = {}\n\
         Advisory Committee Description = {}\n\
         \n\
         {}\n",
        record.product_code(),
        record.applicant(),
        record.device_name(),
        record.advisory_committee(),
        record.advisory_committee_description(),
        json
    ))
}

/// Parse `data.txt` contents back into the JSON record.
pub fn parse_metadata(k_number: &str, contents: &str) -> Result<Value, StorageError> {
    // The JSON object opens on its own line after the header block.
    let start = if contents.starts_with('{') {
        0
    } else {
        contents
            .find("\n{")
            .map(|at| at + 1)
            .ok_or_else(|| StorageError::MetadataMissingJson(k_number.to_string()))?
    };

    let json = &contents[start..];
    serde_json::from_str(json).map_err(|e| StorageError::MetadataParse {
        k_number: k_number.to_string(),
        line: e.line(),
        column: e.column(),
        message: e.to_string(),
        context: error_context(json, e.line(), e.column()),
    })
}

/// Text surrounding a 1-based (line, column) position.
fn error_context(text: &str, line: usize, column: usize) -> String {
    let line_text = text.lines().nth(line.saturating_sub(1)).unwrap_or("");
    let chars: Vec<char> = line_text.chars().collect();
    let at = column.saturating_sub(1).min(chars.len());
    let from = at.saturating_sub(ERROR_CONTEXT_CHARS);
    let to = (at + ERROR_CONTEXT_CHARS).min(chars.len());
    chars[from..to].iter().collect()
}

/// Read and parse the metadata record of an artifact.
pub fn read_metadata(artifact: &ArtifactDir) -> Result<Value, StorageError> {
    let contents = fs::read_to_string(artifact.metadata_path())?;
    parse_metadata(&artifact.k_number, &contents)
}

/// Read the OCR text of an artifact.
pub fn read_text(artifact: &ArtifactDir) -> Result<String, StorageError> {
    Ok(fs::read_to_string(artifact.text_path())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn record() -> ResultRecord {
        ResultRecord::from_value(json!({
            "k_number": "K981234",
            "product_code": "HWC",
            "applicant": "ACME ORTHO",
            "device_name": "ACME SCREW",
            "advisory_committee": "OR",
            "advisory_committee_description": "Orthopedic",
            "statement_or_summary": "Summary",
            "openfda": {
                "device_name": "Screw, Fixation, Bone",
                "registration_number": ["3001234567"],
                "fei_number": ["3001234567"]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_year_bucket() {
        assert_eq!(year_bucket("K981234").as_deref(), Some("1998"));
        assert_eq!(year_bucket("K761234").as_deref(), Some("1976"));
        assert_eq!(year_bucket("K751234").as_deref(), Some("2075"));
        assert_eq!(year_bucket("K051234").as_deref(), Some("2005"));
        assert_eq!(year_bucket("DEN1234"), None);
    }

    #[test]
    fn test_artifact_dir_bucketing() {
        let flat = DocumentStore::new("/docs", false);
        assert_eq!(flat.artifact_dir("K981234"), PathBuf::from("/docs/K981234"));
        let bucketed = DocumentStore::new("/docs", true);
        assert_eq!(
            bucketed.artifact_dir("K981234"),
            PathBuf::from("/docs/1998/K981234")
        );
    }

    #[test]
    fn test_metadata_roundtrip_redacts() {
        let text = format_metadata(&record()).unwrap();
        assert!(text.starts_with("Product Code = HWC\n"));
        assert!(text.contains("Advisory Committee Description = Orthopedic\n"));
        assert!(!text.contains("3001234567"));

        let value = parse_metadata("K981234", &text).unwrap();
        assert_eq!(value["k_number"], "K981234");
        assert_eq!(value["openfda"]["registration_number"], REDACTED);
        assert_eq!(value["openfda"]["fei_number"], REDACTED);
        assert_eq!(value["openfda"]["device_name"], "Screw, Fixation, Bone");
    }

    #[test]
    fn test_parse_metadata_errors_carry_context() {
        let broken = "Product Code = X\n\n{\n  \"k_number\": \"K981234\",\n  \"bad\" 1\n}\n";
        match parse_metadata("K981234", broken) {
            Err(StorageError::MetadataParse {
                k_number, context, ..
            }) => {
                assert_eq!(k_number, "K981234");
                assert!(context.contains("bad"));
            }
            other => panic!("unexpected: {:?}", other),
        }

        assert!(matches!(
            parse_metadata("K981234", "Product Code = X\n"),
            Err(StorageError::MetadataMissingJson(_))
        ));
    }

    #[test]
    fn test_parse_metadata_crlf_and_multibyte_header() {
        for description in ["Orthopédie", "Ortho€"] {
            let text = format_metadata(&record())
                .unwrap()
                .replace("Orthopedic", description)
                .replace('\n', "\r\n");
            let value = parse_metadata("K981234", &text).unwrap();
            assert_eq!(value["k_number"], "K981234");
            assert_eq!(value["openfda"]["fei_number"], REDACTED);
        }
    }

    #[test]
    fn test_prepare_rejects_non_identifier() {
        let dir = tempdir().unwrap();
        let docs = dir.path().join("pdf");
        let store = DocumentStore::new(&docs, false);

        assert!(matches!(
            store.prepare("../escaped"),
            Err(StorageError::InvalidIdentifier(_))
        ));
        assert!(!dir.path().join("escaped").exists());
        assert!(!docs.exists());
    }

    #[test]
    fn test_complete_lifecycle_and_scan() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path(), true);
        let rec = record();

        store.prepare(&rec.k_number).unwrap();
        store.append_text(&rec.k_number, "page one ").unwrap();
        assert!(!store.is_complete(&rec.k_number));
        store.append_text(&rec.k_number, "page two").unwrap();
        store.write_metadata(&rec).unwrap();
        assert!(store.is_complete(&rec.k_number));

        // Half-finished neighbour and an unrelated folder.
        store.prepare("K990001").unwrap();
        store.append_text("K990001", "partial").unwrap();
        fs::create_dir_all(dir.path().join("scratch")).unwrap();

        let found = store.scan().unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].k_number, "K981234");
        assert!(found[0].is_complete());
        assert_eq!(read_text(&found[0]).unwrap(), "page one page two");
        assert!(!found[1].is_complete());

        store.purge(&found[1]).unwrap();
        assert_eq!(store.scan().unwrap().len(), 1);
    }

    #[test]
    fn test_prepare_clears_previous_attempt() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path(), false);
        store.prepare("K100001").unwrap();
        store.append_text("K100001", "stale").unwrap();
        store.prepare("K100001").unwrap();
        store.append_text("K100001", "fresh").unwrap();
        let text = fs::read_to_string(store.artifact_dir("K100001").join(OCR_TEXT_FILENAME)).unwrap();
        assert_eq!(text, "fresh");

        store.mark_incomplete("K100001").unwrap();
        assert!(store.artifact_dir("K100001").exists());
        assert!(!store.is_complete("K100001"));
    }
}
