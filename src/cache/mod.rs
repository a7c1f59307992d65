pub mod queries;

use rusqlite::Connection;
use rusqlite::ffi::ErrorCode;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),
    #[error("Cache quota exceeded")]
    QuotaExceeded,
    #[error("Cached payload is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, _) if err.code == ErrorCode::DiskFull => {
                Self::QuotaExceeded
            }
            other => Self::Sqlite(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Default size bound of the store, in bytes.
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Local key/value store holding the cached payload and a few small markers.
pub struct Cache {
    pub conn: Connection,
}

impl Cache {
    pub fn open(path: &Path, max_bytes: u64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.init(max_bytes)?;
        Ok(cache)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_limit(DEFAULT_MAX_BYTES)
    }

    pub fn open_in_memory_with_limit(max_bytes: u64) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.init(max_bytes)?;
        Ok(cache)
    }

    fn init(&self, max_bytes: u64) -> Result<()> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.migrate()?;
        self.set_limit(max_bytes)?;
        Ok(())
    }

    /// Bound the database file. Writes past the bound fail with
    /// [`CacheError::QuotaExceeded`].
    fn set_limit(&self, max_bytes: u64) -> Result<()> {
        let page_size: i64 = self
            .conn
            .pragma_query_value(None, "page_size", |row| row.get(0))
            .unwrap_or(4096);
        let pages = (max_bytes as i64 / page_size.max(1)).max(1);
        self.conn.pragma_update(None, "max_page_count", pages)?;
        log::debug!("cache bounded to {pages} pages of {page_size} bytes");
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version < 1 {
            self.migrate_v1()?;
        }

        self.conn.pragma_update(None, "user_version", 1)?;
        Ok(())
    }

    /// V1: single key/value table
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key         TEXT PRIMARY KEY,
                value       TEXT NOT NULL,
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_on_disk_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");
        {
            let cache = Cache::open(&path, DEFAULT_MAX_BYTES).unwrap();
            cache.set("k", "v").unwrap();
        }
        let cache = Cache::open(&path, DEFAULT_MAX_BYTES).unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_disk_full_maps_to_quota() {
        let cache = Cache::open_in_memory_with_limit(16 * 1024).unwrap();
        let big = "x".repeat(200_000);
        let err = cache.set("big", &big).unwrap_err();
        assert!(matches!(err, CacheError::QuotaExceeded), "got {err:?}");
    }
}
