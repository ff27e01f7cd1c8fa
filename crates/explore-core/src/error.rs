//! Error types shared across the workspace

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// A transcript file could not be turned into an episode
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transcript has no segments")]
    Empty,

    #[error("Cannot derive source/episode from path {0}")]
    InvalidPath(PathBuf),

    #[error("Duplicate episode {0}")]
    Duplicate(String),
}

/// A parse failure attributed to one input file
#[derive(Error, Debug)]
#[error("{}: {error}", .path.display())]
pub struct FileError {
    pub path: PathBuf,
    #[source]
    pub error: ParseError,
}

impl FileError {
    pub fn new(path: impl Into<PathBuf>, error: ParseError) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}

/// Invalid caller-supplied configuration or request parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Page must be at least 1 (got {0})")]
    InvalidPage(usize),

    #[error("Page size must be between 1 and {max} (got {got})")]
    InvalidPageSize { got: usize, max: usize },

    #[error("date_from {from} is after date_to {to}")]
    InvalidDateRange { from: NaiveDate, to: NaiveDate },

    #[error("Invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Unknown search mode: {0}")]
    UnknownMode(String),

    #[error("Unknown position filter: {0}")]
    UnknownPosition(String),

    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}
