//! Chunked multi-row inserts
//!
//! SQLite caps the number of bound parameters per statement, so a batch is
//! split into chunks of `MAX_BOUND_PARAMS / columns` rows and each chunk is
//! written with a single multi-row `INSERT`. Callers run this inside their own
//! transaction.

use chrono::NaiveDate;
use explore_core::DocId;
use rusqlite::types::ToSql;
use rusqlite::Connection;

use crate::connection::StoreError;
use crate::schema::TableSpec;

/// Bound parameters per statement; SQLite's default `SQLITE_MAX_VARIABLE_NUMBER`
/// since 3.32, kept as a portable limit even where a build allows more
pub const MAX_BOUND_PARAMS: usize = 32_766;

/// A value that can be written as one row of a [`TableSpec`]
pub trait InsertRow {
    /// Push one parameter per column, in column order
    fn bind<'a>(&'a self, params: &mut Vec<&'a dyn ToSql>);
}

impl TableSpec {
    /// Rows that fit in a single statement
    pub fn rows_per_chunk(&self) -> usize {
        (MAX_BOUND_PARAMS / self.columns.len().max(1)).max(1)
    }

    fn insert_sql(&self, rows: usize) -> String {
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        let values = vec![format!("({})", placeholders); rows].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.name,
            self.columns.join(", "),
            values
        )
    }
}

/// Insert `rows` into `table`, returning the number of rows written
pub fn batch_insert<R: InsertRow>(conn: &Connection, table: &TableSpec, rows: &[R]) -> Result<usize, StoreError> {
    let width = table.columns.len();
    let mut written = 0;

    for chunk in rows.chunks(table.rows_per_chunk()) {
        let mut params: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() * width);
        for row in chunk {
            let before = params.len();
            row.bind(&mut params);
            let got = params.len() - before;
            if got != width {
                return Err(StoreError::ColumnMismatch {
                    table: table.name,
                    got,
                    expected: width,
                });
            }
        }

        let mut stmt = conn.prepare_cached(&table.insert_sql(chunk.len()))?;
        stmt.execute(params.as_slice())?;
        written += chunk.len();
    }

    Ok(written)
}

/// Row of the `documents` table
#[derive(Debug, Clone)]
pub struct DocumentRow<'a> {
    pub doc_id: DocId,
    pub uuid: &'a str,
    pub source: &'a str,
    pub episode: &'a str,
    pub episode_date: Option<NaiveDate>,
    pub episode_title: &'a str,
    pub full_text: &'a str,
}

impl InsertRow for DocumentRow<'_> {
    fn bind<'a>(&'a self, params: &mut Vec<&'a dyn ToSql>) {
        params.push(&self.doc_id);
        params.push(&self.uuid);
        params.push(&self.source);
        params.push(&self.episode);
        params.push(&self.episode_date);
        params.push(&self.episode_title);
        params.push(&self.full_text);
    }
}

/// Row of the `segments` table
#[derive(Debug, Clone)]
pub struct SegmentRow<'a> {
    pub doc_id: DocId,
    pub segment_id: i64,
    pub text: &'a str,
    pub avg_logprob: Option<f64>,
    pub char_offset: i64,
    pub start_time: f64,
    pub end_time: f64,
}

impl InsertRow for SegmentRow<'_> {
    fn bind<'a>(&'a self, params: &mut Vec<&'a dyn ToSql>) {
        params.push(&self.doc_id);
        params.push(&self.segment_id);
        params.push(&self.text);
        params.push(&self.avg_logprob);
        params.push(&self.char_offset);
        params.push(&self.start_time);
        params.push(&self.end_time);
    }
}

/// Row of either full-text table, keyed by the owning document
#[derive(Debug, Clone)]
pub struct FullTextRow<'a> {
    pub doc_id: DocId,
    pub text: &'a str,
}

impl InsertRow for FullTextRow<'_> {
    fn bind<'a>(&'a self, params: &mut Vec<&'a dyn ToSql>) {
        params.push(&self.doc_id);
        params.push(&self.text);
    }
}
