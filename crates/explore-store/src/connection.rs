//! Store handle and connection lifecycle

use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::pool::PooledConnection;
use crate::schema::{self, DB_VERSION};

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store not found at {0}")]
    NotFound(PathBuf),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store not initialized (run: explore index build)")]
    NotInitialized,

    #[error("Store version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: i32, found: i32 },

    #[error("Row for {table} bound {got} values, expected {expected}")]
    ColumnMismatch {
        table: &'static str,
        got: usize,
        expected: usize,
    },
}

/// Default store path
pub fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
    PathBuf::from(home).join(".explore").join("explore.sqlite")
}

/// How connections to the store are opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Query access; the store must already exist at the current version
    ReadOnly,
    /// Build access; creates the file and schema when missing
    ReadWrite,
}

/// Tuning applied to every connection
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Page cache per connection, in KiB
    pub cache_size_kib: i64,
    pub busy_timeout: Duration,
    /// Idle reader connections kept for reuse
    pub max_idle_readers: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_size_kib: 1024 * 1024,
            busy_timeout: Duration::from_secs(5),
            max_idle_readers: 8,
        }
    }
}

impl StoreConfig {
    pub fn with_cache_size_kib(mut self, kib: i64) -> Self {
        self.cache_size_kib = kib;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn with_max_idle_readers(mut self, n: usize) -> Self {
        self.max_idle_readers = n;
        self
    }
}

pub(crate) struct StoreInner {
    pub(crate) path: PathBuf,
    pub(crate) mode: StoreMode,
    pub(crate) config: StoreConfig,
    pub(crate) idle: Mutex<Vec<Connection>>,
}

/// Shared handle to one on-disk store
///
/// Cheap to clone and safe to share across threads. Connections themselves
/// are never shared: each caller gets its own.
#[derive(Clone)]
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.path)
            .field("mode", &self.inner.mode)
            .finish()
    }
}

impl Store {
    /// Open the store at the default path
    pub fn open_default(mode: StoreMode) -> Result<Self, StoreError> {
        Self::open(default_db_path(), mode, StoreConfig::default())
    }

    /// Open the store at a specific path
    pub fn open<P: AsRef<Path>>(path: P, mode: StoreMode, config: StoreConfig) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let first = match mode {
            StoreMode::ReadWrite => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                let conn = open_connection(&path, mode, &config)?;
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;",
                )?;
                schema::init_schema(&conn)?;
                conn
            }
            StoreMode::ReadOnly => {
                if !path.exists() {
                    return Err(StoreError::NotFound(path));
                }
                let conn = open_connection(&path, mode, &config)?;
                check_version(&conn)?;
                conn
            }
        };

        debug!(path = %path.display(), ?mode, "opened store");

        Ok(Self {
            inner: Arc::new(StoreInner {
                path,
                mode,
                config,
                idle: Mutex::new(vec![first]),
            }),
        })
    }

    /// Get the store path
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn mode(&self) -> StoreMode {
        self.inner.mode
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Open a dedicated connection owned by the caller
    pub fn connect(&self) -> Result<Connection, StoreError> {
        open_connection(&self.inner.path, self.inner.mode, &self.inner.config)
    }

    /// Check out a pooled connection; it returns to the pool on drop
    pub fn reader(&self) -> Result<PooledConnection, StoreError> {
        let reused = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop();
        let conn = match reused {
            Some(conn) => conn,
            None => self.connect()?,
        };
        Ok(PooledConnection::new(conn, Arc::clone(&self.inner)))
    }

    /// Close idle pooled connections, surfacing any close failure
    ///
    /// Connections still checked out close when they are dropped.
    pub fn close(self) -> Result<(), StoreError> {
        let idle: Vec<Connection> = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for conn in idle {
            conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        }
        Ok(())
    }

    /// Get store statistics
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.reader()?;

        let version: i32 = conn
            .query_row(
                "SELECT CAST(value AS INTEGER) FROM metadata WHERE key = 'version'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        let document_count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let segment_count: i64 = conn.query_row("SELECT COUNT(*) FROM segments", [], |row| row.get(0))?;
        let source_count: i64 =
            conn.query_row("SELECT COUNT(DISTINCT source) FROM documents", [], |row| row.get(0))?;
        let total_chars: i64 = conn.query_row(
            "SELECT COALESCE(SUM(length(full_text)), 0) FROM documents",
            [],
            |row| row.get(0),
        )?;

        let last_indexed: Option<String> = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'last_indexed'",
                [],
                |row| row.get(0),
            )
            .ok();

        let db_size = std::fs::metadata(&self.inner.path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            version,
            document_count,
            segment_count,
            source_count,
            total_chars,
            last_indexed,
            db_path: self.inner.path.clone(),
            db_size_bytes: db_size,
        })
    }
}

/// Store statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub version: i32,
    pub document_count: i64,
    pub segment_count: i64,
    pub source_count: i64,
    pub total_chars: i64,
    pub last_indexed: Option<String>,
    pub db_path: PathBuf,
    pub db_size_bytes: u64,
}

fn open_connection(path: &Path, mode: StoreMode, config: &StoreConfig) -> Result<Connection, StoreError> {
    let flags = match mode {
        StoreMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        StoreMode::ReadWrite => {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
        }
    };
    let conn = Connection::open_with_flags(path, flags)?;

    conn.busy_timeout(config.busy_timeout)?;
    conn.execute_batch(&format!(
        "PRAGMA cache_size = -{};
         PRAGMA temp_store = MEMORY;",
        config.cache_size_kib.max(0)
    ))?;

    Ok(conn)
}

fn check_version(conn: &Connection) -> Result<(), StoreError> {
    let version: Option<i32> = conn
        .query_row(
            "SELECT CAST(value AS INTEGER) FROM metadata WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .ok();

    match version {
        None => Err(StoreError::NotInitialized),
        Some(v) if v != DB_VERSION => Err(StoreError::VersionMismatch {
            expected: DB_VERSION,
            found: v,
        }),
        Some(_) => Ok(()),
    }
}

/// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`
pub fn with_transaction<F, T, E>(conn: &mut Connection, f: F) -> Result<T, E>
where
    F: FnOnce(&Connection) -> Result<T, E>,
    E: From<rusqlite::Error>,
{
    let tx = conn.transaction()?;
    let result = f(&tx)?;
    tx.commit()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn document_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .unwrap()
    }

    fn insert_document(conn: &Connection, doc_id: i64, uuid: &str) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO documents (doc_id, uuid, source, episode, episode_title, full_text)
             VALUES (?1, ?2, 'src', ?2, 'title', 'text')",
            rusqlite::params![doc_id, uuid],
        )
    }

    #[test]
    fn test_read_write_creates_store() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("explore.sqlite");

        let store = Store::open(&path, StoreMode::ReadWrite, StoreConfig::default()).unwrap();
        assert!(path.exists());
        assert_eq!(store.mode(), StoreMode::ReadWrite);

        let mode: String = store
            .reader()
            .unwrap()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_read_only_requires_existing_store() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.sqlite");
        assert!(matches!(
            Store::open(&path, StoreMode::ReadOnly, StoreConfig::default()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_read_only_rejects_uninitialized_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.sqlite");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE other (x INTEGER)")
            .unwrap();

        assert!(matches!(
            Store::open(&path, StoreMode::ReadOnly, StoreConfig::default()),
            Err(StoreError::NotInitialized)
        ));
    }

    #[test]
    fn test_read_only_cannot_write() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("explore.sqlite");
        drop(Store::open(&path, StoreMode::ReadWrite, StoreConfig::default()).unwrap());

        let store = Store::open(&path, StoreMode::ReadOnly, StoreConfig::default()).unwrap();
        let conn = store.reader().unwrap();
        assert!(insert_document(&conn, 1, "u1").is_err());
    }

    #[test]
    fn test_cache_size_is_applied() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("explore.sqlite");
        let config = StoreConfig::default().with_cache_size_kib(4096);
        let store = Store::open(&path, StoreMode::ReadWrite, config).unwrap();

        let conn = store.connect().unwrap();
        let cache: i64 = conn.query_row("PRAGMA cache_size", [], |row| row.get(0)).unwrap();
        assert_eq!(cache, -4096);
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("db.sqlite"), StoreMode::ReadWrite, StoreConfig::default()).unwrap();
        let mut conn = store.connect().unwrap();

        with_transaction(&mut conn, |tx| -> Result<(), StoreError> {
            insert_document(tx, 1, "u1")?;
            insert_document(tx, 2, "u2")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(document_count(&conn), 2);
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("db.sqlite"), StoreMode::ReadWrite, StoreConfig::default()).unwrap();
        let mut conn = store.connect().unwrap();

        let result = with_transaction(&mut conn, |tx| -> Result<(), StoreError> {
            insert_document(tx, 1, "u1")?;
            // Duplicate uuid violates the unique constraint
            insert_document(tx, 2, "u1")?;
            Ok(())
        });

        assert!(matches!(result, Err(StoreError::Sqlite(_))));
        assert_eq!(document_count(&conn), 0);
    }

    #[test]
    fn test_stats_on_empty_store() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("db.sqlite"), StoreMode::ReadWrite, StoreConfig::default()).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.version, DB_VERSION);
        assert_eq!(stats.document_count, 0);
        assert_eq!(stats.segment_count, 0);
        assert!(stats.last_indexed.is_none());
    }

    #[test]
    fn test_close_drains_pool() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("db.sqlite"), StoreMode::ReadWrite, StoreConfig::default()).unwrap();
        let other = store.clone();
        store.close().unwrap();
        // Handle stays usable; a fresh connection is opened on demand
        assert!(other.reader().is_ok());
    }
}
