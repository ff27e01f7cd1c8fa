//! Segment command - resolve a position in an episode to its segment

use anyhow::{bail, Result};
use explore_query::SegmentLocator;

use crate::cli::{Cli, OutputFormat};
use crate::commands::open_engine;
use crate::output::{colors, json};

pub fn run(cli: &Cli, uuid: &str, offset: Option<usize>, index: Option<i64>) -> Result<()> {
    let locator = match (offset, index) {
        (Some(offset), None) => SegmentLocator::CharOffset(offset),
        (None, Some(index)) => SegmentLocator::SegmentIndex(index),
        _ => bail!("exactly one of --offset or --index is required"),
    };

    let engine = open_engine(cli)?;
    let segment = engine.resolve_segment(uuid, locator)?;

    match cli.format {
        OutputFormat::Human => {
            let document = engine.document(segment.doc_id)?;
            let date = document.episode_date.map(|d| d.to_string());
            println!(
                "{}",
                colors::episode(&document.source, &document.episode_title, date.as_deref())
            );
            println!(
                "  {} {}",
                colors::label(&format!("#{}", segment.segment_id)),
                colors::time_range(segment.start_time, segment.end_time)
            );
            println!("  {}", segment.text);
        }
        OutputFormat::Json => json::print(&segment)?,
        OutputFormat::Minimal => {
            println!(
                "{}\t{:.2}\t{:.2}\t{}",
                segment.segment_id, segment.start_time, segment.end_time, segment.text
            );
        }
    }

    Ok(())
}
