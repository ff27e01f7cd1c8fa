//! Index command - build the store and report on it

use anyhow::{Context, Result};
use explore_indexer::{build_with_progress, BuildConfig, BuildReport};
use explore_store::{Store, StoreConfig, StoreMode};
use std::io::Write;

use crate::cli::{BuildArgs, Cli, OutputFormat};
use crate::output::{colors, json};

/// Progress line is redrawn every this many documents
const PROGRESS_EVERY: usize = 100;

pub fn build(cli: &Cli, args: &BuildArgs) -> Result<()> {
    let db_path = cli.db_path();
    let store_config = StoreConfig::default().with_cache_size_kib(args.cache_mib.saturating_mul(1024));
    let store = Store::open(&db_path, StoreMode::ReadWrite, store_config)
        .with_context(|| format!("opening store at {}", db_path.display()))?;

    let mut config = BuildConfig::default();
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    if let Some(n) = args.flush_docs {
        config = config.with_doc_flush_threshold(n);
    }
    if let Some(n) = args.flush_segments {
        config = config.with_segment_flush_threshold(n);
    }

    let show_progress = cli.format == OutputFormat::Human && atty::is(atty::Stream::Stderr);
    let report = build_with_progress(&store, &args.data_dir, &config, |progress| {
        if show_progress && (progress.accepted % PROGRESS_EVERY == 0 || progress.accepted == progress.total) {
            eprint!("\r  {} {}/{}", colors::label("Indexed"), progress.accepted, progress.total);
            let _ = std::io::stderr().flush();
        }
    })?;
    if show_progress {
        eprintln!();
    }
    store.close()?;

    match cli.format {
        OutputFormat::Human => print_report(&report),
        OutputFormat::Json => json::print(&serde_json::json!({
            "db_path": db_path,
            "files_discovered": report.files_discovered,
            "documents_indexed": report.documents_indexed,
            "segments_indexed": report.segments_indexed,
            "files_skipped": report.files_skipped.iter().map(|f| serde_json::json!({
                "path": f.path,
                "error": f.error.to_string(),
            })).collect::<Vec<_>>(),
            "elapsed_ms": report.elapsed.as_millis() as u64,
        }))?,
        OutputFormat::Minimal => {
            println!("{}\t{}", report.documents_indexed, report.segments_indexed);
        }
    }

    Ok(())
}

fn print_report(report: &BuildReport) {
    println!("{}", colors::header("Index Build"));
    println!();
    println!(
        "  {}: {}",
        colors::label("Files discovered"),
        colors::format_count(report.files_discovered as u64)
    );
    println!(
        "  {}: {}",
        colors::label("Documents"),
        colors::format_count(report.documents_indexed as u64)
    );
    println!(
        "  {}: {}",
        colors::label("Segments"),
        colors::format_count(report.segments_indexed as u64)
    );
    println!(
        "  {}: {}",
        colors::label("Elapsed"),
        colors::value(&format!("{:.1}s", report.elapsed.as_secs_f64()))
    );

    if !report.files_skipped.is_empty() {
        println!();
        println!(
            "{}",
            colors::warning(&format!("{} files skipped", report.files_skipped.len()))
        );
        for skipped in &report.files_skipped {
            println!("  {}: {}", skipped.path.display(), skipped.error);
        }
    }

    println!();
    println!("{}", colors::success("Index built"));
}

pub fn status(cli: &Cli) -> Result<()> {
    let db_path = cli.db_path();
    let store = match Store::open(&db_path, StoreMode::ReadOnly, StoreConfig::default()) {
        Ok(store) => store,
        Err(e) => {
            match cli.format {
                OutputFormat::Json => json::print(&serde_json::json!({
                    "status": "not_initialized",
                    "db_path": db_path,
                    "error": e.to_string(),
                }))?,
                _ => {
                    println!("{}", colors::error("Store not available"));
                    println!("  {}", e);
                    println!();
                    println!("Build it with: explore index build <DATA_DIR>");
                }
            }
            return Ok(());
        }
    };
    let stats = store.stats()?;

    match cli.format {
        OutputFormat::Human => {
            println!("{}", colors::header("Index Status"));
            println!();
            println!("  {}: {}", colors::label("Store"), stats.db_path.display());
            println!("  {}: {}", colors::label("Size"), colors::format_size(stats.db_size_bytes));
            println!(
                "  {}: {}",
                colors::label("Version"),
                colors::value(&stats.version.to_string())
            );
            println!();
            println!(
                "  {}: {}",
                colors::label("Sources"),
                colors::format_count(stats.source_count.max(0) as u64)
            );
            println!(
                "  {}: {}",
                colors::label("Documents"),
                colors::format_count(stats.document_count.max(0) as u64)
            );
            println!(
                "  {}: {}",
                colors::label("Segments"),
                colors::format_count(stats.segment_count.max(0) as u64)
            );
            println!(
                "  {}: {}",
                colors::label("Characters"),
                colors::format_count(stats.total_chars.max(0) as u64)
            );

            if let Some(last) = &stats.last_indexed {
                println!();
                println!("  {}: {}", colors::label("Last indexed"), colors::value(last));
            }
        }
        OutputFormat::Json => json::print(&serde_json::json!({
            "status": "ok",
            "db_path": stats.db_path,
            "db_size_bytes": stats.db_size_bytes,
            "version": stats.version,
            "sources": stats.source_count,
            "documents": stats.document_count,
            "segments": stats.segment_count,
            "characters": stats.total_chars,
            "last_indexed": stats.last_indexed,
        }))?,
        OutputFormat::Minimal => {
            println!("{}\t{}", stats.document_count, stats.segment_count);
        }
    }

    Ok(())
}
