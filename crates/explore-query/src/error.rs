//! Query errors

use explore_core::ConfigError;
use explore_store::StoreError;
use thiserror::Error;

/// Errors returned by the query engine and the offset resolver
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Audio path {0:?} leaves the audio directory")]
    UnsafeAudioPath(String),

    #[error("Invalid request: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Query cancelled")]
    Cancelled,
}

impl From<rusqlite::Error> for QueryError {
    fn from(e: rusqlite::Error) -> Self {
        QueryError::Storage(StoreError::Sqlite(e))
    }
}

impl QueryError {
    pub(crate) fn invalid_pattern(pattern: &str, message: impl ToString) -> Self {
        QueryError::InvalidPattern {
            pattern: pattern.to_string(),
            message: message.to_string(),
        }
    }
}
