//! JSON output formatting

use anyhow::Result;
use serde::Serialize;

/// Print a value as JSON on stdout
pub fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
