//! Store schema
//!
//! `documents_fts` and `documents_trigram` are external-content FTS5 tables
//! over `documents.full_text`; their rowid is the document's `doc_id`. They are
//! written explicitly alongside the document rows rather than through
//! triggers, so a bulk load pays for exactly one insert per table.

use rusqlite::Connection;

use crate::connection::StoreError;

/// Current schema version
pub const DB_VERSION: i32 = 1;

/// Name and column list of a table targeted by [`crate::batch_insert`]
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

pub const DOCUMENTS: TableSpec = TableSpec {
    name: "documents",
    columns: &[
        "doc_id",
        "uuid",
        "source",
        "episode",
        "episode_date",
        "episode_title",
        "full_text",
    ],
};

pub const SEGMENTS: TableSpec = TableSpec {
    name: "segments",
    columns: &[
        "doc_id",
        "segment_id",
        "segment_text",
        "avg_logprob",
        "char_offset",
        "start_time",
        "end_time",
    ],
};

pub const DOCUMENTS_FTS: TableSpec = TableSpec {
    name: "documents_fts",
    columns: &["rowid", "full_text"],
};

pub const DOCUMENTS_TRIGRAM: TableSpec = TableSpec {
    name: "documents_trigram",
    columns: &["rowid", "full_text"],
};

/// Secondary indexes, dropped during bulk loads and rebuilt afterwards
const SECONDARY_INDEXES: &[(&str, &str)] = &[
    ("idx_documents_source", "documents(source)"),
    ("idx_documents_date", "documents(episode_date)"),
    ("idx_segments_doc_offset", "segments(doc_id, char_offset)"),
];

/// Create all tables and indexes that do not exist yet
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT
        )",
    )?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS documents (
            doc_id INTEGER PRIMARY KEY,
            uuid TEXT NOT NULL UNIQUE,
            source TEXT NOT NULL,
            episode TEXT NOT NULL,
            episode_date TEXT,
            episode_title TEXT NOT NULL,
            full_text TEXT NOT NULL,
            UNIQUE(source, episode)
        )",
    )?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS segments (
            doc_id INTEGER NOT NULL,
            segment_id INTEGER NOT NULL,
            segment_text TEXT NOT NULL,
            avg_logprob REAL,
            char_offset INTEGER NOT NULL,
            start_time REAL NOT NULL,
            end_time REAL NOT NULL,
            PRIMARY KEY (doc_id, segment_id)
        ) WITHOUT ROWID",
    )?;

    // Word index for exact matching
    conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
            full_text,
            content='documents',
            content_rowid='doc_id',
            tokenize='unicode61 remove_diacritics 0'
        )",
    )?;

    // Trigram index for substring and regex narrowing
    conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS documents_trigram USING fts5(
            full_text,
            content='documents',
            content_rowid='doc_id',
            tokenize='trigram'
        )",
    )?;

    create_indexes(conn)?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('version', ?1)",
        [&DB_VERSION.to_string()],
    )?;

    Ok(())
}

/// Create the secondary indexes
pub fn create_indexes(conn: &Connection) -> Result<(), StoreError> {
    for (name, target) in SECONDARY_INDEXES {
        conn.execute_batch(&format!("CREATE INDEX IF NOT EXISTS {} ON {}", name, target))?;
    }
    Ok(())
}

/// Drop the secondary indexes
pub fn drop_indexes(conn: &Connection) -> Result<(), StoreError> {
    for (name, _) in SECONDARY_INDEXES {
        conn.execute_batch(&format!("DROP INDEX IF EXISTS {}", name))?;
    }
    Ok(())
}

/// Names of the secondary indexes currently present
pub fn existing_indexes(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}
