//! Audio command - locate an episode's audio file

use anyhow::Result;
use explore_query::DirectoryAudioLocator;
use std::path::Path;

use crate::cli::{Cli, OutputFormat};
use crate::commands::open_engine;
use crate::output::json;

pub fn run(cli: &Cli, uuid: &str, audio_dir: &Path, extension: &str) -> Result<()> {
    let engine = open_engine(cli)?;
    let locator = DirectoryAudioLocator::new(audio_dir).with_extension(extension);
    let path = engine.lookup_audio_location(uuid, &locator)?;

    match cli.format {
        OutputFormat::Json => json::print(&serde_json::json!({ "uuid": uuid, "path": path }))?,
        _ => println!("{}", path.display()),
    }

    Ok(())
}
