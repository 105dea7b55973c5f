//! Shared helper functions for CLI commands.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::TermHit;

/// Output target meaning standard output.
pub const STDOUT_TARGET: &str = "-";

/// Whether an `--output` value refers to standard output.
pub fn is_stdout(target: &str) -> bool {
    let target = target.trim();
    target.is_empty() || target == STDOUT_TARGET || target == "stdout"
}

/// Where command output goes: standard output or a named file.
pub enum OutputSink {
    Stdout(io::Stdout),
    File(BufWriter<File>),
}

impl OutputSink {
    /// Open `target`. Named files are truncated unless `append` is set.
    pub fn open(target: &str, append: bool) -> io::Result<Self> {
        if is_stdout(target) {
            return Ok(Self::Stdout(io::stdout()));
        }
        Self::open_file(Path::new(target.trim()), append)
    }

    pub fn open_file(path: &Path, append: bool) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        Ok(Self::File(BufWriter::new(file)))
    }

    pub fn is_stdout(&self) -> bool {
        matches!(self, Self::Stdout(_))
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(out) => out.write(buf),
            Self::File(out) => out.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(out) => out.flush(),
            Self::File(out) => out.flush(),
        }
    }
}

/// Paths for the `.json` and `.dat` report files derived from `--output`.
/// `None` means both go to standard output.
pub fn report_paths(target: &str) -> Option<(PathBuf, PathBuf)> {
    if is_stdout(target) {
        return None;
    }
    let base = Path::new(target.trim()).with_extension("");
    Some((base.with_extension("json"), base.with_extension("dat")))
}

/// Live per-document hit report written during a crawl.
pub fn format_hit_report(
    k_number: &str,
    pages: usize,
    product_code: &str,
    device_name: &str,
    hits: &[TermHit],
) -> String {
    let mut report = format!(
        "File {} {} pages\n    Product Code = {}\n    Device name = {}\n",
        k_number, pages, product_code, device_name
    );
    for hit in hits {
        report.push_str(&format!(
            "        Has {} with ratio {}\n",
            hit.term, hit.score
        ));
    }
    report
}
