//! Configuration for the miner.
//!
//! An optional TOML file supplies overrides. Everything has a working default, so a
//! bare `fda-miner crawl` in an empty directory stores documents under `./pdf/`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TermGroup;

/// Default config filename looked up inside the data directory.
pub const CONFIG_FILENAME: &str = "fda-miner.toml";
/// Cursor database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "fda-miner.db";
/// Subdirectory for per-document artifacts.
pub const DOCUMENTS_SUBDIR: &str = "pdf";
/// Seeded product-code lookup, relative to the data directory.
pub const DEFAULT_PRODUCTS_DB: &str = "data/product.db";

pub const DEFAULT_API_BASE: &str = "https://api.fda.gov/device";
pub const DEFAULT_DETAIL_BASE: &str =
    "https://www.accessdata.fda.gov/scripts/cdrh/cfdocs/cfPMN/pmn.cfm";
pub const DEFAULT_PAGE_SIZE: u32 = 500;
pub const DEFAULT_CUTOFF: u8 = 80;
pub const DEFAULT_RENDER_DPI: u32 = 300;
/// Upper bound on retries of a single request.
pub const MAX_RETRIES: u32 = 10;

/// Errors raised while loading configuration. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid setting '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// File-level configuration. Every field is optional; unset fields fall back to
/// the defaults in [`Settings`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products_db: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Delay between requests in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_dpi: Option<u32>,
    /// Per-page OCR timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_by_year: Option<bool>,
    /// Where downloaded PDFs and page images live while a document is processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
    /// Extra term groups, merged over the built-in ones by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub term_groups: BTreeMap<String, Vec<String>>,
}

impl Config {
    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

/// Options for locating configuration.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file; must exist.
    pub config_path: Option<PathBuf>,
    /// Data directory (defaults to the current directory).
    pub data_dir: Option<PathBuf>,
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub documents_dir: PathBuf,
    pub database_filename: String,
    pub products_db: PathBuf,
    pub api_base: String,
    pub detail_base: String,
    pub page_size: u32,
    pub user_agent: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Delay between requests in milliseconds.
    pub request_delay_ms: u64,
    pub max_retries: u32,
    pub render_dpi: u32,
    /// Per-page OCR timeout in seconds.
    pub ocr_timeout: u64,
    pub ocr_language: String,
    pub workers: usize,
    pub bucket_by_year: bool,
    pub scratch_dir: PathBuf,
    pub term_groups: Vec<TermGroup>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_data_dir(PathBuf::from("."))
    }
}

impl Settings {
    /// Default settings rooted at `data_dir`.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            documents_dir: data_dir.join(DOCUMENTS_SUBDIR),
            products_db: data_dir.join(DEFAULT_PRODUCTS_DB),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            detail_base: DEFAULT_DETAIL_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            user_agent: concat!("fda-miner/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: 30,
            request_delay_ms: 250,
            max_retries: 3,
            render_dpi: DEFAULT_RENDER_DPI,
            ocr_timeout: 120,
            ocr_language: "eng".to_string(),
            workers: 4,
            bucket_by_year: false,
            scratch_dir: std::env::temp_dir(),
            term_groups: TermGroup::builtin(),
        }
    }

    /// Apply file overrides. Relative paths resolve against the data directory.
    pub fn apply_config(&mut self, config: Config) -> Result<(), ConfigError> {
        if let Some(dir) = config.documents_dir {
            self.documents_dir = self.resolve(dir);
        }
        if let Some(db) = config.database {
            self.database_filename = db;
        }
        if let Some(path) = config.products_db {
            self.products_db = self.resolve(path);
        }
        if let Some(base) = config.api_base {
            self.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(base) = config.detail_base {
            self.detail_base = base;
        }
        if let Some(size) = config.page_size {
            if size == 0 {
                return Err(ConfigError::Invalid {
                    key: "page_size",
                    reason: "must be at least 1".to_string(),
                });
            }
            self.page_size = size;
        }
        if let Some(ua) = config.user_agent {
            self.user_agent = ua;
        }
        if let Some(t) = config.request_timeout {
            self.request_timeout = t;
        }
        if let Some(d) = config.request_delay_ms {
            self.request_delay_ms = d;
        }
        if let Some(r) = config.max_retries {
            if r > MAX_RETRIES {
                return Err(ConfigError::Invalid {
                    key: "max_retries",
                    reason: format!("{} is above {}", r, MAX_RETRIES),
                });
            }
            self.max_retries = r;
        }
        if let Some(dpi) = config.render_dpi {
            if !(72..=1200).contains(&dpi) {
                return Err(ConfigError::Invalid {
                    key: "render_dpi",
                    reason: format!("{} is outside 72..=1200", dpi),
                });
            }
            self.render_dpi = dpi;
        }
        if let Some(t) = config.ocr_timeout {
            self.ocr_timeout = t;
        }
        if let Some(lang) = config.ocr_language {
            self.ocr_language = lang;
        }
        if let Some(workers) = config.workers {
            if workers == 0 {
                return Err(ConfigError::Invalid {
                    key: "workers",
                    reason: "must be at least 1".to_string(),
                });
            }
            self.workers = workers;
        }
        if let Some(bucket) = config.bucket_by_year {
            self.bucket_by_year = bucket;
        }
        if let Some(dir) = config.scratch_dir {
            self.scratch_dir = self.resolve(dir);
        }
        for (name, entries) in config.term_groups {
            let group = TermGroup::from_entries(&name, &entries);
            if group.is_empty() {
                return Err(ConfigError::Invalid {
                    key: "term_groups",
                    reason: format!("group '{}' has no terms", name),
                });
            }
            match self.term_groups.iter_mut().find(|g| g.name == name) {
                Some(existing) => *existing = group,
                None => self.term_groups.push(group),
            }
        }
        Ok(())
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout)
    }

    /// Find a term group by name (case-insensitive).
    pub fn term_group(&self, name: &str) -> Option<&TermGroup> {
        self.term_groups
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(name))
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.term_groups.iter().map(|g| g.name.as_str()).collect()
    }

    /// Create the data, documents and scratch directories.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (what, dir) in [
            ("data", &self.data_dir),
            ("documents", &self.documents_dir),
            ("scratch", &self.scratch_dir),
        ] {
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to create {} directory '{}': {}", what, dir.display(), e),
                )
            })?;
        }
        Ok(())
    }
}

/// Load settings: defaults, then the config file (explicit, or `fda-miner.toml`
/// in the data directory if present).
pub fn load_settings(options: &LoadOptions) -> Result<Settings, ConfigError> {
    let data_dir = options
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let mut settings = Settings::with_data_dir(data_dir);

    let config_path = match &options.config_path {
        Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.clone())),
        Some(path) => Some(path.clone()),
        None => {
            let candidate = settings.data_dir.join(CONFIG_FILENAME);
            candidate.exists().then_some(candidate)
        }
    };

    if let Some(path) = config_path {
        tracing::debug!("Loading config from {}", path.display());
        settings.apply_config(Config::from_file(&path)?)?;
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = Settings::with_data_dir(PathBuf::from("/data"));
        assert_eq!(settings.documents_dir, PathBuf::from("/data/pdf"));
        assert_eq!(settings.database_path(), PathBuf::from("/data/fda-miner.db"));
        assert_eq!(settings.page_size, 500);
        assert_eq!(settings.render_dpi, 300);
        assert!(settings.term_group("be").is_some());
        assert!(settings.term_group("AM").is_some());
    }

    #[test]
    fn test_apply_config_overrides() {
        let config = Config::from_toml(
            r#"
            documents_dir = "docs"
            page_size = 100
            workers = 2
            bucket_by_year = true
            scratch_dir = "tmp"

            [term_groups]
            BE = ["resorbable", "!suture"]
            PEEK = ["polyetheretherketone", "peek"]
            "#,
        )
        .unwrap();

        let mut settings = Settings::with_data_dir(PathBuf::from("/data"));
        settings.apply_config(config).unwrap();

        assert_eq!(settings.documents_dir, PathBuf::from("/data/docs"));
        assert_eq!(settings.page_size, 100);
        assert_eq!(settings.workers, 2);
        assert!(settings.bucket_by_year);
        assert_eq!(settings.scratch_dir, PathBuf::from("/data/tmp"));
        assert_eq!(settings.term_group("BE").unwrap().terms.len(), 2);
        assert_eq!(settings.term_group("peek").unwrap().terms.len(), 2);
        assert_eq!(settings.term_groups.len(), 3);
    }

    #[test]
    fn test_rejects_empty_group_and_zero_workers() {
        let mut settings = Settings::default();
        let config = Config::from_toml("[term_groups]\nEMPTY = [\"  \"]\n").unwrap();
        assert!(matches!(
            settings.apply_config(config),
            Err(ConfigError::Invalid { key: "term_groups", .. })
        ));

        let config = Config::from_toml("workers = 0\n").unwrap();
        assert!(settings.apply_config(config).is_err());
    }

    #[test]
    fn test_max_retries_bounded() {
        let mut settings = Settings::default();
        let config = Config::from_toml("max_retries = 40\n").unwrap();
        assert!(matches!(
            settings.apply_config(config),
            Err(ConfigError::Invalid { key: "max_retries", .. })
        ));

        let config = Config::from_toml("max_retries = 10\n").unwrap();
        settings.apply_config(config).unwrap();
        assert_eq!(settings.max_retries, 10);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_toml("bogus = 1\n").is_err());
    }

    #[test]
    fn test_load_settings_discovers_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "page_size = 42\n").unwrap();
        let settings = load_settings(&LoadOptions {
            config_path: None,
            data_dir: Some(dir.path().to_path_buf()),
        })
        .unwrap();
        assert_eq!(settings.page_size, 42);
    }

    #[test]
    fn test_load_settings_missing_explicit_file() {
        let dir = tempdir().unwrap();
        let result = load_settings(&LoadOptions {
            config_path: Some(dir.path().join("nope.toml")),
            data_dir: Some(dir.path().to_path_buf()),
        });
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
