//! explore-indexer - Batch index builder
//!
//! This crate owns all **write** operations to the explore store. Transcript
//! files are discovered under a data directory, parsed by a bounded pool of
//! worker threads, and handed to a single writer that commits them in large
//! transactions. The companion `explore-query` crate opens the same store
//! read-only.

pub mod builder;
pub mod discovery;
pub mod writer;

pub use builder::{build, build_with_progress, BuildConfig, BuildProgress, BuildReport, IndexerError};
pub use discovery::find_transcript_files;
pub use writer::{BatchWriter, WriterStats};
