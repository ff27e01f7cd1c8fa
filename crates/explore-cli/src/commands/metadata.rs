//! Metadata command - filter options for a query

use anyhow::Result;
use colored::Colorize;

use crate::cli::{Cli, MatchArgs, OutputFormat};
use crate::commands::open_engine;
use crate::commands::search::search_options;
use crate::output::{colors, json};

pub fn run(cli: &Cli, query: &str, matching: &MatchArgs) -> Result<()> {
    let engine = open_engine(cli)?;
    let metadata = engine.metadata(query, matching.mode, &search_options(matching))?;

    match cli.format {
        OutputFormat::Human => {
            if metadata.total_results == 0 {
                println!("No results found for: {}", query.cyan());
                return Ok(());
            }

            println!(
                "{}",
                colors::header(&format!(
                    "{} results for '{}' ({})",
                    colors::format_count(metadata.total_results as u64),
                    query,
                    matching.mode
                ))
            );
            println!();
            for (source, count) in &metadata.sources {
                println!(
                    "  {:<24} {}",
                    source.cyan(),
                    colors::value(&colors::format_count(*count as u64))
                );
            }
            if let Some(range) = metadata.date_range {
                println!();
                println!(
                    "  {}: {} .. {}",
                    colors::label("Dates"),
                    colors::value(&range.min.to_string()),
                    colors::value(&range.max.to_string())
                );
            }
        }
        OutputFormat::Json => json::print(&metadata)?,
        OutputFormat::Minimal => {
            for (source, count) in &metadata.sources {
                println!("{}\t{}", source, count);
            }
        }
    }

    Ok(())
}
