//! CLI command implementations

pub mod audio;
pub mod doctor;
pub mod index;
pub mod metadata;
pub mod search;
pub mod segment;

use anyhow::{Context, Result};
use explore_query::SearchEngine;
use explore_store::StoreConfig;
use tracing::debug;

use crate::cli::Cli;

/// Open the store read-only for queries
pub fn open_engine(cli: &Cli) -> Result<SearchEngine> {
    let path = cli.db_path();
    debug!(path = %path.display(), "opening store read-only");
    SearchEngine::open(&path, StoreConfig::default())
        .with_context(|| format!("opening store at {}", path.display()))
}
