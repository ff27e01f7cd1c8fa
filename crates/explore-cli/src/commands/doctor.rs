//! Doctor command - diagnose the store

use anyhow::Result;
use explore_store::{Store, StoreConfig, StoreMode, DB_VERSION};
use serde::Serialize;

use crate::cli::{Cli, OutputFormat};
use crate::output::{colors, json};

const FTS_TABLES: [&str; 2] = ["documents_fts", "documents_trigram"];

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    passed: bool,
    details: String,
}

pub fn run(cli: &Cli) -> Result<()> {
    let mut checks: Vec<Check> = Vec::new();

    let db_path = cli.db_path();
    let db_exists = db_path.is_file();
    checks.push(Check {
        name: "Store file",
        passed: db_exists,
        details: if db_exists {
            format!("Found at {}", db_path.display())
        } else {
            format!("Not found at {}", db_path.display())
        },
    });

    let store = if db_exists {
        let opened = Store::open(&db_path, StoreMode::ReadOnly, StoreConfig::default());
        checks.push(Check {
            name: "Store opens",
            passed: opened.is_ok(),
            details: match &opened {
                Ok(_) => "Opened read-only".to_string(),
                Err(e) => e.to_string(),
            },
        });
        opened.ok()
    } else {
        None
    };

    if let Some(store) = &store {
        match store.stats() {
            Ok(stats) => {
                checks.push(Check {
                    name: "Schema version",
                    passed: stats.version == DB_VERSION,
                    details: format!("v{} (expected v{})", stats.version, DB_VERSION),
                });
                checks.push(Check {
                    name: "Has data",
                    passed: stats.document_count > 0,
                    details: format!(
                        "{} documents, {} segments",
                        colors::format_count(stats.document_count.max(0) as u64),
                        colors::format_count(stats.segment_count.max(0) as u64)
                    ),
                });
            }
            Err(e) => checks.push(Check {
                name: "Schema version",
                passed: false,
                details: format!("Query failed: {}", e),
            }),
        }

        let missing = missing_fts_tables(store);
        checks.push(Check {
            name: "Full-text tables",
            passed: missing.is_empty(),
            details: if missing.is_empty() {
                FTS_TABLES.join(", ")
            } else {
                format!("Missing: {}", missing.join(", "))
            },
        });
    }

    let all_passed = checks.iter().all(|c| c.passed);

    match cli.format {
        OutputFormat::Json => json::print(&serde_json::json!({
            "checks": checks,
            "all_passed": all_passed,
        }))?,
        _ => {
            println!("{}", colors::header("Explore Doctor"));
            println!();
            for check in &checks {
                let status = if check.passed {
                    colors::success(check.name)
                } else {
                    colors::error(check.name)
                };
                println!("  {} - {}", status, check.details);
            }

            println!();
            if all_passed {
                println!("{}", colors::success("All checks passed"));
            } else {
                println!("{}", colors::error("Some checks failed"));
                println!();
                println!("To fix:");
                println!("  Run: explore index build <DATA_DIR>");
            }
        }
    }

    Ok(())
}

fn missing_fts_tables(store: &Store) -> Vec<&'static str> {
    let conn = match store.reader() {
        Ok(conn) => conn,
        Err(_) => return FTS_TABLES.to_vec(),
    };
    FTS_TABLES
        .iter()
        .copied()
        .filter(|table| {
            let found: rusqlite::Result<i64> = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            );
            !matches!(found, Ok(n) if n > 0)
        })
        .collect()
}
