//! Search command - full-text search across transcripts

use anyhow::Result;
use chrono::NaiveDate;
use colored::Colorize;
use explore_core::SearchFilters;
use explore_query::{SearchOptions, SearchRequest, SearchResult};

use crate::cli::{Cli, MatchArgs, OutputFormat};
use crate::commands::open_engine;
use crate::output::{colors, json};

/// Source and date restrictions taken from the command line
pub struct Filters<'a> {
    pub sources: &'a [String],
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl Filters<'_> {
    fn to_search_filters(&self) -> SearchFilters {
        let mut filters = SearchFilters::new();
        if !self.sources.is_empty() {
            filters = filters.with_sources(self.sources.iter().cloned());
        }
        if let Some(from) = self.from {
            filters = filters.with_date_from(from);
        }
        if let Some(to) = self.to {
            filters = filters.with_date_to(to);
        }
        filters
    }
}

/// Matching options for the engine
pub fn search_options(matching: &MatchArgs) -> SearchOptions {
    SearchOptions::new()
        .with_ignore_punct(matching.ignore_punct)
        .with_positions(matching.positions.iter().copied())
}

pub fn run(
    cli: &Cli,
    query: &str,
    matching: &MatchArgs,
    filters: &Filters<'_>,
    page: usize,
    page_size: usize,
) -> Result<()> {
    let engine = open_engine(cli)?;
    let request = SearchRequest::new(query, matching.mode)
        .with_filters(filters.to_search_filters())
        .with_options(search_options(matching))
        .with_page(page, page_size);

    let result = engine.search(&request)?;

    match cli.format {
        OutputFormat::Human => print_human(&result),
        OutputFormat::Json => json::print(&result)?,
        OutputFormat::Minimal => {
            for hit in &result.hits {
                println!(
                    "{}\t{}\t{:.2}\t{:.2}\t{}",
                    hit.uuid, hit.segment_id, hit.start_time, hit.end_time, hit.segment_text
                );
            }
        }
    }

    Ok(())
}

fn print_human(result: &SearchResult) {
    if result.hits.is_empty() {
        if result.total_results > 0 {
            println!(
                "No hits on page {} ({} results over {} pages)",
                result.page,
                result.total_results,
                result.total_pages()
            );
        } else {
            println!("No results found for: {}", result.query.cyan());
        }
        return;
    }

    println!(
        "{}",
        colors::header(&format!(
            "{} results for '{}' ({})",
            colors::format_count(result.total_results as u64),
            result.query,
            result.mode
        ))
    );

    for group in result.episodes() {
        println!();
        let date = group.episode_date.map(|d| d.to_string());
        println!("{}", colors::episode(group.source, group.episode_title, date.as_deref()));
        for hit in &group.hits {
            let count = if hit.match_count > 1 {
                format!(" {}", format!("x{}", hit.match_count).yellow())
            } else {
                String::new()
            };
            let start = hit.char_offset.saturating_sub(hit.segment_char_offset);
            println!(
                "  {} {}{}",
                colors::time_range(hit.start_time, hit.end_time),
                colors::highlight(&hit.segment_text, start, hit.matched_text.chars().count()),
                count
            );
        }
    }

    println!();
    println!(
        "{}",
        colors::label(&format!("Page {} of {}", result.page, result.total_pages()))
    );
    if result.has_more {
        println!("{}", colors::label(&format!("Next page: --page {}", result.page + 1)));
    }
}
