//! explore-store - Storage layer for the transcript index
//!
//! Owns the on-disk layout: documents, segments and two FTS5 tables over the
//! document text (a word index and a trigram index). The index builder is the
//! only writer; the query engine opens the store read-only. Every thread works
//! on its own connection, either opened with [`Store::connect`] or checked out
//! of the reader pool with [`Store::reader`].

pub mod batch;
pub mod connection;
pub mod pool;
pub mod rebuild;
pub mod schema;

pub use batch::{batch_insert, DocumentRow, FullTextRow, InsertRow, SegmentRow, MAX_BOUND_PARAMS};
pub use connection::{
    default_db_path, with_transaction, Store, StoreConfig, StoreError, StoreMode, StoreStats,
};
pub use pool::PooledConnection;
pub use rebuild::{rebuild_indexes, reset_store};
pub use schema::{init_schema, TableSpec, DB_VERSION};
