//! explore-core - Core types and algorithms for transcript search
//!
//! This crate provides the data model shared by the indexer and the query
//! engine: documents and segments, character offset bookkeeping, transcript
//! file parsing, word/token rules, and search filters.

pub mod error;
pub mod filter;
pub mod offsets;
pub mod parser;
pub mod text;
pub mod types;

pub use error::*;
pub use filter::*;
pub use offsets::*;
pub use parser::*;
pub use types::*;
