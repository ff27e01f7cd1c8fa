//! Checked-out reader connections

use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::connection::StoreInner;

/// A connection borrowed from a [`crate::Store`]'s idle pool
///
/// Exclusively owned by the holder until dropped, then handed back to the
/// pool (or closed once the pool is full).
pub struct PooledConnection {
    conn: Option<Connection>,
    store: Arc<StoreInner>,
}

impl PooledConnection {
    pub(crate) fn new(conn: Connection, store: Arc<StoreInner>) -> Self {
        Self {
            conn: Some(conn),
            store,
        }
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only taken in Drop
        self.conn.as_ref().expect("pooled connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("pooled connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let mut idle = self.store.idle.lock().unwrap_or_else(|e| e.into_inner());
        if idle.len() < self.store.config.max_idle_readers {
            idle.push(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Store, StoreConfig, StoreMode};
    use tempfile::TempDir;

    #[test]
    fn test_connections_return_to_pool() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("db.sqlite"), StoreMode::ReadWrite, StoreConfig::default()).unwrap();

        {
            let a = store.reader().unwrap();
            let b = store.reader().unwrap();
            let one: i64 = a.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
            let two: i64 = b.query_row("SELECT 2", [], |row| row.get(0)).unwrap();
            assert_eq!(one + two, 3);
        }

        assert_eq!(store.inner.idle.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_pool_is_bounded() {
        let temp = TempDir::new().unwrap();
        let config = StoreConfig::default().with_max_idle_readers(1);
        let store = Store::open(temp.path().join("db.sqlite"), StoreMode::ReadWrite, config).unwrap();

        {
            let _a = store.reader().unwrap();
            let _b = store.reader().unwrap();
            let _c = store.reader().unwrap();
        }

        assert_eq!(store.inner.idle.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_readers_work_across_threads() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("db.sqlite"), StoreMode::ReadWrite, StoreConfig::default()).unwrap();

        std::thread::scope(|s| {
            for _ in 0..4 {
                let store = store.clone();
                s.spawn(move || {
                    let conn = store.reader().unwrap();
                    let n: i64 = conn
                        .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
                        .unwrap();
                    assert_eq!(n, 0);
                });
            }
        });
    }
}
