//! Audio file lookup

use explore_core::Document;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::engine::SearchEngine;
use crate::error::QueryError;

/// Maps a document to the audio file it was transcribed from
pub trait AudioLocator {
    fn locate(&self, document: &Document) -> Result<PathBuf, QueryError>;
}

/// Audio files stored as `<root>/<episode>.<extension>`
#[derive(Debug, Clone)]
pub struct DirectoryAudioLocator {
    root: PathBuf,
    extension: String,
}

impl DirectoryAudioLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "opus".to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Where the audio for `document` is expected to be. The episode name
    /// must stay below the root: no `..`, `.`, root or prefix components.
    pub fn path_for(&self, document: &Document) -> Result<PathBuf, QueryError> {
        let name = format!("{}.{}", document.episode, self.extension);
        let relative = Path::new(&name);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(QueryError::UnsafeAudioPath(name));
        }
        Ok(self.root.join(relative))
    }
}

impl AudioLocator for DirectoryAudioLocator {
    fn locate(&self, document: &Document) -> Result<PathBuf, QueryError> {
        let path = self.path_for(document)?;
        if path.is_file() {
            Ok(path)
        } else {
            Err(QueryError::NotFound(format!("audio file {}", path.display())))
        }
    }
}

impl SearchEngine {
    /// Audio file of the document with this uuid
    pub fn lookup_audio_location(&self, uuid: &str, locator: &dyn AudioLocator) -> Result<PathBuf, QueryError> {
        let document = self.document_by_uuid(uuid)?;
        let path = locator.locate(&document)?;
        debug!(uuid, path = %path.display(), "located audio");
        Ok(path)
    }
}
