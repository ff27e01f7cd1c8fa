//! File discovery for transcript JSON files

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Find all transcript JSON files below `dir`, sorted by path
pub fn find_transcript_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_transcript(p))
        .collect();

    files.sort();
    files
}

fn is_transcript(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.starts_with('.'));
    let json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    json && !hidden
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_transcript_files() {
        let temp = TempDir::new().unwrap();
        let episode = temp.path().join("podcast").join("2024.01.15 Pilot");
        fs::create_dir_all(&episode).unwrap();

        fs::write(episode.join("transcript.json"), "[]").unwrap();
        fs::write(episode.join("audio.opus"), "").unwrap();
        fs::write(episode.join(".partial.json"), "[]").unwrap();
        fs::write(temp.path().join("podcast").join("notes.txt"), "").unwrap();

        let other = temp.path().join("radio").join("ep1");
        fs::create_dir_all(&other).unwrap();
        fs::write(other.join("full.JSON"), "[]").unwrap();

        let files = find_transcript_files(temp.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("podcast/2024.01.15 Pilot/transcript.json"));
        assert!(files[1].ends_with("radio/ep1/full.JSON"));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(find_transcript_files(&temp.path().join("nope")).is_empty());
    }
}
