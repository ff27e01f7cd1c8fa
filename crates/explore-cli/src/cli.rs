//! CLI argument definitions

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use explore_core::{parse_date, HitPosition, SearchMode};
use explore_query::DEFAULT_PAGE_SIZE;
use explore_store::default_db_path;
use std::path::PathBuf;

/// Build and search a full-text index of spoken-word transcripts
#[derive(Parser, Debug)]
#[command(name = "explore")]
#[command(version)]
#[command(about = "Build and search a full-text index of spoken-word transcripts")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Custom store path
    #[arg(long, global = true, env = "EXPLORE_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }
}

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// Pretty-printed JSON
    Json,
    /// Tab-separated fields, one hit per line
    Minimal,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage the index
    #[command(subcommand)]
    Index(IndexCommand),

    /// Search transcripts
    Search {
        /// Query text (or pattern in regex mode)
        query: String,

        #[command(flatten)]
        matching: MatchArgs,

        /// Only episodes from this source (repeatable)
        #[arg(long = "source", short = 's')]
        sources: Vec<String>,

        /// Earliest episode date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,

        /// Latest episode date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,

        /// Page number, starting at 1
        #[arg(long, short = 'p', default_value_t = 1)]
        page: usize,

        /// Hits per page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },

    /// Sources and date range of every hit of a query
    Metadata {
        query: String,

        #[command(flatten)]
        matching: MatchArgs,
    },

    /// Show the segment at a character offset or index of an episode
    Segment {
        /// Episode uuid
        uuid: String,

        /// Character offset into the episode text
        #[arg(long, conflicts_with = "index", required_unless_present = "index")]
        offset: Option<usize>,

        /// Segment index within the episode
        #[arg(long)]
        index: Option<i64>,
    },

    /// Print the audio file path of an episode
    Audio {
        /// Episode uuid
        uuid: String,

        /// Directory holding the audio files
        #[arg(long, env = "EXPLORE_AUDIO_DIR")]
        audio_dir: PathBuf,

        /// Audio file extension
        #[arg(long, default_value = "opus")]
        extension: String,
    },

    /// Diagnose the store
    Doctor,
}

#[derive(Subcommand, Debug)]
pub enum IndexCommand {
    /// Rebuild the store from a data directory
    Build(BuildArgs),

    /// Show index status and statistics
    Status,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Directory laid out as <source>/<episode>/*.json
    pub data_dir: PathBuf,

    /// Parse worker threads
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Flush after this many pending documents
    #[arg(long)]
    pub flush_docs: Option<usize>,

    /// Flush after this many pending segments
    #[arg(long)]
    pub flush_segments: Option<usize>,

    /// Page cache per connection, in MiB
    #[arg(long, default_value_t = 1024)]
    pub cache_mib: i64,
}

/// Matching options shared by `search` and `metadata`
#[derive(Args, Debug)]
pub struct MatchArgs {
    /// exact, partial or regex
    #[arg(long, short = 'm', default_value = "exact")]
    pub mode: SearchMode,

    /// Let punctuation and whitespace between words vary
    #[arg(long)]
    pub ignore_punct: bool,

    /// Keep only hits at these segment positions: start, end, cross (repeatable)
    #[arg(long = "position")]
    pub positions: Vec<HitPosition>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_args() {
        let cli = Cli::try_parse_from([
            "explore", "search", "שלום", "--mode", "partial", "-s", "radio", "-s", "tv", "--from", "2024-01-01",
            "--position", "start", "--page", "2",
        ])
        .unwrap();
        match cli.command {
            Command::Search {
                query,
                matching,
                sources,
                from,
                to,
                page,
                page_size,
            } => {
                assert_eq!(query, "שלום");
                assert_eq!(matching.mode, SearchMode::Partial);
                assert_eq!(matching.positions, vec![HitPosition::Start]);
                assert!(!matching.ignore_punct);
                assert_eq!(sources, vec!["radio", "tv"]);
                assert_eq!(from, NaiveDate::from_ymd_opt(2024, 1, 1));
                assert_eq!(to, None);
                assert_eq!(page, 2);
                assert_eq!(page_size, DEFAULT_PAGE_SIZE);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Cli::try_parse_from(["explore", "search", "x", "--mode", "fuzzy"]).is_err());
        assert!(Cli::try_parse_from(["explore", "search", "x", "--from", "15/01/2024"]).is_err());
        assert!(Cli::try_parse_from(["explore", "search", "x", "--position", "middle"]).is_err());
    }

    #[test]
    fn test_segment_requires_one_locator() {
        assert!(Cli::try_parse_from(["explore", "segment", "u"]).is_err());
        assert!(Cli::try_parse_from(["explore", "segment", "u", "--offset", "3", "--index", "1"]).is_err());
        assert!(Cli::try_parse_from(["explore", "segment", "u", "--index", "1"]).is_ok());
    }

    #[test]
    fn test_build_args() {
        let cli = Cli::try_parse_from(["explore", "--db-path", "/tmp/x.sqlite", "index", "build", "data", "-w", "4"])
            .unwrap();
        assert_eq!(cli.db_path(), PathBuf::from("/tmp/x.sqlite"));
        match cli.command {
            Command::Index(IndexCommand::Build(args)) => {
                assert_eq!(args.data_dir, PathBuf::from("data"));
                assert_eq!(args.workers, Some(4));
                assert_eq!(args.flush_docs, None);
                assert_eq!(args.cache_mib, 1024);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
