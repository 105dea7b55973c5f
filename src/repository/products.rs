//! Product-code lookup.
//!
//! The `device` table (`productcode`, `devicename`) is seeded from the FDA
//! classification file by an external tool; this side only reads it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use super::Result;

/// Resolves a product code to a representative device name.
pub trait DeviceLookup {
    fn device_name(&self, product_code: &str) -> Option<String>;
}

impl DeviceLookup for HashMap<String, String> {
    fn device_name(&self, product_code: &str) -> Option<String> {
        self.get(product_code).cloned()
    }
}

/// Read-only view of the seeded product-code database.
pub struct ProductCodeRepository {
    db_path: PathBuf,
}

impl ProductCodeRepository {
    /// Open the lookup database. Returns `None` when it has not been seeded.
    pub fn open(db_path: &Path) -> Option<Self> {
        if !db_path.exists() {
            return None;
        }
        Some(Self {
            db_path: db_path.to_path_buf(),
        })
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?)
    }

    /// Look up the device name for a product code.
    pub fn find_device_name(&self, product_code: &str) -> Result<Option<String>> {
        let conn = self.connect()?;
        Ok(conn
            .query_row(
                "SELECT devicename FROM device WHERE productcode = ? LIMIT 1",
                params![product_code],
                |row| row.get::<_, String>(0),
            )
            .optional()?)
    }
}

impl DeviceLookup for ProductCodeRepository {
    fn device_name(&self, product_code: &str) -> Option<String> {
        match self.find_device_name(product_code) {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!("Product code lookup failed for {}: {}", product_code, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_database_is_none() {
        let dir = tempdir().unwrap();
        assert!(ProductCodeRepository::open(&dir.path().join("product.db")).is_none());
    }

    #[test]
    fn test_lookup() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("product.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE device (productcode TEXT, devicename TEXT);
            INSERT INTO device VALUES ('HWC', 'Screw, Fixation, Bone');
            "#,
        )
        .unwrap();
        drop(conn);

        let repo = ProductCodeRepository::open(&db_path).unwrap();
        assert_eq!(
            repo.device_name("HWC").as_deref(),
            Some("Screw, Fixation, Bone")
        );
        assert_eq!(repo.device_name("ZZZ"), None);
    }

    #[test]
    fn test_lookup_without_table_logs_and_returns_none() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("product.db");
        Connection::open(&db_path)
            .unwrap()
            .execute_batch("CREATE TABLE unrelated (x TEXT);")
            .unwrap();
        let repo = ProductCodeRepository::open(&db_path).unwrap();
        assert_eq!(repo.device_name("HWC"), None);
    }
}
