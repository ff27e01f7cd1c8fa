//! Transcript JSON parsing
//!
//! A transcript file is either `{"metadata": {...}, "segments": [...]}` or a
//! bare segment array. Source, episode, title and date fall back to what the
//! file's location under the data directory says:
//! `<data_dir>/<source>/<YYYY.MM.DD title>/<file>.json`.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use crate::error::ParseError;
use crate::offsets::join_segments;
use crate::types::{EpisodeRecord, SegmentRecord};

/// Duration given to a segment whose end cannot be inferred
pub const MIN_SEGMENT_SECONDS: f64 = 0.5;

static LEADING_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[.\-_/](\d{1,2})[.\-_/](\d{1,2})(?:[\s._\-]+(.*))?$")
        .expect("date prefix is a valid pattern")
});

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranscriptFile {
    Wrapped {
        #[serde(default)]
        metadata: Option<TranscriptMetadata>,
        segments: Vec<RawSegment>,
    },
    Bare(Vec<RawSegment>),
}

/// Episode metadata embedded in a transcript file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptMetadata {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub episode: Option<String>,
    #[serde(default, alias = "title")]
    pub episode_title: Option<String>,
    #[serde(default, alias = "date")]
    pub episode_date: Option<String>,
    /// Total audio duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    #[serde(default)]
    start: Option<f64>,
    #[serde(default)]
    end: Option<f64>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    avg_logprob: Option<f64>,
}

/// Episode attributes derived from a transcript's location
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodePath {
    pub source: Option<String>,
    pub episode: Option<String>,
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Derive episode attributes from `path` relative to `root`
///
/// `root/src/2024.01.15 Title/file.json` gives source `src`, episode
/// `src/2024.01.15 Title`, title `Title`, date 2024-01-15. A file directly
/// under a source directory uses its file stem as the episode name.
pub fn episode_path_info(root: &Path, path: &Path) -> EpisodePath {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.len() < 2 {
        return EpisodePath::default();
    }

    let source = parts[0].clone();
    let name = if parts.len() == 2 {
        Path::new(&parts[1])
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| parts[1].clone())
    } else {
        parts[parts.len() - 2].clone()
    };
    let episode = if parts.len() == 2 {
        format!("{}/{}", source, name)
    } else {
        parts[..parts.len() - 1].join("/")
    };
    let (date, title) = split_leading_date(&name);

    EpisodePath {
        source: Some(source),
        episode: Some(episode),
        title: Some(title),
        date,
    }
}

/// Split a leading `YYYY.MM.DD` (or `-`, `_`, `/` separated) date off a name
pub fn split_leading_date(name: &str) -> (Option<NaiveDate>, String) {
    let Some(caps) = LEADING_DATE.captures(name.trim()) else {
        return (None, name.trim().to_string());
    };
    let date = match (
        caps[1].parse::<i32>(),
        caps[2].parse::<u32>(),
        caps[3].parse::<u32>(),
    ) {
        (Ok(y), Ok(m), Ok(d)) => NaiveDate::from_ymd_opt(y, m, d),
        _ => None,
    };
    if date.is_none() {
        return (None, name.trim().to_string());
    }
    let rest = caps.get(4).map(|m| m.as_str().trim()).unwrap_or("");
    let title = if rest.is_empty() { name.trim() } else { rest };
    (date, title.to_string())
}

/// Stable identity for an episode that carries no uuid of its own
pub fn episode_uuid(source: &str, episode: &str) -> String {
    let name = format!("{}/{}", source, episode);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// Parse a transcript file located under `root`
pub fn parse_transcript_file(root: &Path, path: &Path) -> Result<EpisodeRecord, ParseError> {
    let bytes = std::fs::read(path)?;
    let fallback = episode_path_info(root, path);
    let file: TranscriptFile = serde_json::from_slice(&bytes)?;
    match build_episode(file, fallback) {
        Some(result) => result,
        None => Err(ParseError::InvalidPath(path.to_path_buf())),
    }
}

/// Parse transcript JSON text with path-derived fallbacks
pub fn parse_transcript_str(json: &str, fallback: EpisodePath) -> Result<EpisodeRecord, ParseError> {
    let file: TranscriptFile = serde_json::from_str(json)?;
    match build_episode(file, fallback) {
        Some(result) => result,
        None => Err(ParseError::InvalidPath(PathBuf::new())),
    }
}

/// `None` when neither the metadata nor the path names a source and episode
fn build_episode(
    file: TranscriptFile,
    fallback: EpisodePath,
) -> Option<Result<EpisodeRecord, ParseError>> {
    let (metadata, raw) = match file {
        TranscriptFile::Wrapped { metadata, segments } => (metadata.unwrap_or_default(), segments),
        TranscriptFile::Bare(segments) => (TranscriptMetadata::default(), segments),
    };

    let source = non_empty(metadata.source.clone()).or(fallback.source)?;
    let episode = non_empty(metadata.episode.clone()).or(fallback.episode)?;

    if raw.is_empty() {
        return Some(Err(ParseError::Empty));
    }

    let episode_date = metadata
        .episode_date
        .as_deref()
        .and_then(|d| split_leading_date(d).0)
        .or(fallback.date);
    let episode_title = non_empty(metadata.episode_title.clone())
        .or(fallback.title)
        .unwrap_or_else(|| episode.clone());
    let uuid = non_empty(metadata.uuid.clone()).unwrap_or_else(|| episode_uuid(&source, &episode));

    let segments = normalize_segments(&raw, metadata.duration);
    let (full_text, offsets) = join_segments(segments.iter().map(|s| s.text.as_str()));
    let segments = segments
        .into_iter()
        .zip(offsets)
        .map(|(mut s, offset)| {
            s.char_offset = offset;
            s
        })
        .collect();

    Some(Ok(EpisodeRecord {
        uuid,
        source,
        episode,
        episode_date,
        episode_title,
        full_text,
        segments,
    }))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Settle start/end times; text is kept verbatim. Offsets are filled in by the caller.
fn normalize_segments(raw: &[RawSegment], duration: Option<f64>) -> Vec<SegmentRecord> {
    let mut starts = Vec::with_capacity(raw.len());
    let mut previous = 0.0f64;
    for seg in raw {
        let start = match seg.start {
            Some(s) if s.is_finite() && s >= 0.0 => s,
            _ => previous,
        };
        starts.push(start);
        previous = start;
    }

    raw.iter()
        .enumerate()
        .map(|(i, seg)| {
            let start = starts[i];
            let end = seg
                .end
                .filter(|e| e.is_finite() && *e > start)
                .or_else(|| starts.get(i + 1).copied().filter(|next| *next > start))
                .or_else(|| {
                    if i + 1 == raw.len() {
                        duration.filter(|d| d.is_finite() && *d > start)
                    } else {
                        None
                    }
                })
                .unwrap_or(start + MIN_SEGMENT_SECONDS);

            SegmentRecord {
                text: seg.text.clone(),
                avg_logprob: seg.avg_logprob.filter(|p| p.is_finite()),
                char_offset: 0,
                start_time: start,
                end_time: end,
            }
        })
        .collect()
}
