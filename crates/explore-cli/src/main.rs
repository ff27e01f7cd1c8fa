//! explore-cli - build and search the explore transcript store

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, IndexCommand};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if !atty::is(atty::Stream::Stdout) {
        colored::control::set_override(false);
    }

    match &cli.command {
        Command::Index(IndexCommand::Build(args)) => commands::index::build(&cli, args),
        Command::Index(IndexCommand::Status) => commands::index::status(&cli),
        Command::Search {
            query,
            matching,
            sources,
            from,
            to,
            page,
            page_size,
        } => commands::search::run(
            &cli,
            query,
            matching,
            &commands::search::Filters {
                sources,
                from: *from,
                to: *to,
            },
            *page,
            *page_size,
        ),
        Command::Metadata { query, matching } => commands::metadata::run(&cli, query, matching),
        Command::Segment { uuid, offset, index } => commands::segment::run(&cli, uuid, *offset, *index),
        Command::Audio {
            uuid,
            audio_dir,
            extension,
        } => commands::audio::run(&cli, uuid, audio_dir, extension),
        Command::Doctor => commands::doctor::run(&cli),
    }
}

/// Log to stderr so stdout stays parseable
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
