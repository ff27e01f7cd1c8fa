//! Bulk-load preparation and post-load index maintenance

use rusqlite::Connection;
use tracing::info;

use crate::connection::StoreError;
use crate::schema;

/// Clear every document and put the store into its bulk-load state
///
/// Drops the data and full-text tables, recreates them, and removes the
/// secondary indexes so inserts do not maintain them row by row. Call
/// [`rebuild_indexes`] once loading is done.
pub fn reset_store(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS documents_fts;
         DROP TABLE IF EXISTS documents_trigram;
         DROP TABLE IF EXISTS segments;
         DROP TABLE IF EXISTS documents;",
    )?;

    schema::init_schema(conn)?;
    schema::drop_indexes(conn)?;

    conn.execute("DELETE FROM metadata WHERE key = 'last_indexed'", [])?;

    Ok(())
}

/// Recreate secondary indexes and compact both full-text indexes
pub fn rebuild_indexes(conn: &Connection) -> Result<(), StoreError> {
    schema::drop_indexes(conn)?;
    schema::create_indexes(conn)?;

    conn.execute_batch(
        "INSERT INTO documents_fts(documents_fts) VALUES ('optimize');
         INSERT INTO documents_trigram(documents_trigram) VALUES ('optimize');
         ANALYZE;",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('last_indexed', ?1)",
        [chrono::Utc::now().to_rfc3339()],
    )?;

    info!("rebuilt secondary and full-text indexes");
    Ok(())
}
