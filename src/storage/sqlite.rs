//! SQLite-backed sorted store
//!
//! All entity kinds share one table. Keys are BLOBs, which SQLite compares
//! with memcmp, so `ORDER BY key` is byte order and matches the in-memory
//! store exactly.
//!
//! Scans page through the table: each page is a bounded `SELECT` that resumes
//! strictly after the last key of the previous page.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{ScanRange, StoreRecord};
use crate::storage::{Store, StoreIterator};

/// Rows fetched per scan page unless configured otherwise
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 256;

/// SQLite implementation of the [`Store`] trait
///
/// The connection sits behind a `std::sync::Mutex` because rusqlite's
/// `Connection` is not `Sync`.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    batch_size: usize,
}

impl SqliteStore {
    /// Open or create a store file
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS entries (
                key BLOB PRIMARY KEY,
                value BLOB NOT NULL
            ) WITHOUT ROWID",
            [],
        )?;

        tracing::info!("Opened SQLite store at {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
            batch_size: DEFAULT_SCAN_BATCH_SIZE,
        })
    }

    /// Builder method: rows fetched per scan page
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of keys currently stored
    pub fn count(&self) -> StorageResult<u64> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn lock(conn: &Mutex<Connection>) -> StorageResult<std::sync::MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| StorageError::Lock(format!("Failed to acquire connection lock: {}", e)))
}

#[async_trait]
impl Store for SqliteStore {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let conn = lock(&self.conn)?;
        let value = conn
            .query_row(
                "SELECT value FROM entries WHERE key = ?",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO entries (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn scan(&self, range: ScanRange) -> StorageResult<Box<dyn StoreIterator + Send>> {
        Ok(Box::new(SqliteIterator {
            conn: Arc::clone(&self.conn),
            exhausted: range.is_empty(),
            range,
            cursor: None,
            page: VecDeque::new(),
            batch_size: self.batch_size,
        }))
    }
}

/// Paging cursor over a [`SqliteStore`] range
struct SqliteIterator {
    conn: Arc<Mutex<Connection>>,
    range: ScanRange,
    /// Last key fetched from the table; the next page starts strictly beyond it
    cursor: Option<Vec<u8>>,
    page: VecDeque<StoreRecord>,
    batch_size: usize,
    /// No rows remain in the table beyond the current page
    exhausted: bool,
}

impl SqliteIterator {
    fn fetch_page(&mut self) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        let limit = self.batch_size as i64;

        let sql = match (&self.cursor, self.range.reverse) {
            (None, false) => {
                "SELECT key, value FROM entries WHERE key >= ?1 AND key <= ?2
                 ORDER BY key ASC LIMIT ?3"
            }
            (Some(_), false) => {
                "SELECT key, value FROM entries WHERE key > ?1 AND key <= ?2
                 ORDER BY key ASC LIMIT ?3"
            }
            (None, true) => {
                "SELECT key, value FROM entries WHERE key >= ?1 AND key <= ?2
                 ORDER BY key DESC LIMIT ?3"
            }
            (Some(_), true) => {
                "SELECT key, value FROM entries WHERE key >= ?1 AND key < ?2
                 ORDER BY key DESC LIMIT ?3"
            }
        };

        let (low, high) = match (&self.cursor, self.range.reverse) {
            (Some(last), false) => (last.as_slice(), self.range.lte.as_slice()),
            (Some(last), true) => (self.range.gte.as_slice(), last.as_slice()),
            (None, _) => (self.range.gte.as_slice(), self.range.lte.as_slice()),
        };

        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![low, high, limit], |row| {
            Ok(StoreRecord {
                key: row.get(0)?,
                value: row.get(1)?,
            })
        })?;

        let mut fetched = 0usize;
        for row in rows {
            self.page.push_back(row?);
            fetched += 1;
        }

        if let Some(last) = self.page.back() {
            self.cursor = Some(last.key.clone());
        }
        if fetched < self.batch_size {
            self.exhausted = true;
        }

        Ok(())
    }
}

#[async_trait]
impl StoreIterator for SqliteIterator {
    async fn next(&mut self) -> StorageResult<Option<StoreRecord>> {
        if self.page.is_empty() && !self.exhausted {
            self.fetch_page()?;
        }
        Ok(self.page.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn collect_keys(store: &SqliteStore, range: ScanRange) -> Vec<String> {
        let mut iter = store.scan(range).await.unwrap();
        let mut keys = Vec::new();
        while let Some(record) = iter.next().await.unwrap() {
            keys.push(String::from_utf8(record.key).unwrap());
        }
        keys
    }

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("konsum.db")).unwrap();

        assert_eq!(store.get(b"k").await.unwrap(), None);
        store.put(b"k", b"one").await.unwrap();
        store.put(b"k", b"two").await.unwrap();

        assert_eq!(store.get(b"k").await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scan_pages_in_both_directions() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("konsum.db"))
            .unwrap()
            .batch_size(3);

        for i in 0..10 {
            let key = format!("k{:02}", i);
            store.put(key.as_bytes(), b"v").await.unwrap();
        }

        let forward = collect_keys(&store, ScanRange::new("k02", "k08")).await;
        assert_eq!(
            forward,
            vec!["k02", "k03", "k04", "k05", "k06", "k07", "k08"]
        );

        let backward = collect_keys(&store, ScanRange::new("k02", "k08").reverse(true)).await;
        assert_eq!(
            backward,
            vec!["k08", "k07", "k06", "k05", "k04", "k03", "k02"]
        );

        assert!(collect_keys(&store, ScanRange::new("k08", "k02")).await.is_empty());
    }

    #[tokio::test]
    async fn test_byte_order_matches_utf8_order() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("konsum.db")).unwrap();

        let high = "p\u{FFFF}";
        store.put("p\u{0000}".as_bytes(), b"low").await.unwrap();
        store.put("pa".as_bytes(), b"mid").await.unwrap();
        store.put("pé".as_bytes(), b"accent").await.unwrap();
        store.put(high.as_bytes(), b"high").await.unwrap();
        store.put(b"q", b"outside").await.unwrap();

        let keys = collect_keys(&store, ScanRange::new("p", high)).await;
        assert_eq!(keys, vec!["p\u{0000}", "pa", "pé", high]);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("konsum.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.put(b"categories.CAT-1", b"{}").await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get(b"categories.CAT-1").await.unwrap(),
            Some(b"{}".to_vec())
        );
        assert_eq!(store.path(), path.as_path());
    }
}
