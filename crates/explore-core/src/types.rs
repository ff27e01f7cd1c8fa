//! Core type definitions for indexed transcripts

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Dense row identity assigned to a document at build time
pub type DocId = i64;

/// One indexed episode (a single transcript file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: DocId,
    /// Stable external identity, unique across the store
    pub uuid: String,
    pub source: String,
    pub episode: String,
    #[serde(default)]
    pub episode_date: Option<NaiveDate>,
    pub episode_title: String,
}

/// A time-aligned unit of transcribed speech within a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub doc_id: DocId,
    /// Position of the segment within its document, starting at 0
    pub segment_id: i64,
    pub text: String,
    #[serde(default)]
    pub avg_logprob: Option<f64>,
    /// Character (not byte) offset of the segment's first character in the document text
    pub char_offset: usize,
    pub start_time: f64,
    pub end_time: f64,
}

impl Segment {
    /// Length of the segment text in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Character offset one past the segment's last character
    pub fn char_end(&self) -> usize {
        self.char_offset + self.char_len()
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// A parsed transcript that has not been written to the store yet
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRecord {
    pub uuid: String,
    pub source: String,
    pub episode: String,
    pub episode_date: Option<NaiveDate>,
    pub episode_title: String,
    /// Segment texts joined by [`crate::SEGMENT_SEPARATOR`]
    pub full_text: String,
    pub segments: Vec<SegmentRecord>,
}

impl EpisodeRecord {
    /// Build the document row this record becomes once it has an id
    pub fn document(&self, doc_id: DocId) -> Document {
        Document {
            doc_id,
            uuid: self.uuid.clone(),
            source: self.source.clone(),
            episode: self.episode.clone(),
            episode_date: self.episode_date,
            episode_title: self.episode_title.clone(),
        }
    }

    /// Segments bound to a document id, in order
    pub fn segments(&self, doc_id: DocId) -> impl Iterator<Item = Segment> + '_ {
        self.segments
            .iter()
            .enumerate()
            .map(move |(i, s)| Segment {
                doc_id,
                segment_id: i as i64,
                text: s.text.clone(),
                avg_logprob: s.avg_logprob,
                char_offset: s.char_offset,
                start_time: s.start_time,
                end_time: s.end_time,
            })
    }
}

/// A normalised segment of a parsed transcript
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRecord {
    pub text: String,
    pub avg_logprob: Option<f64>,
    pub char_offset: usize,
    pub start_time: f64,
    pub end_time: f64,
}

/// Matching semantics of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Whole-word literal occurrences
    #[default]
    Exact,
    /// Literal substring occurrences, mid-word included
    Partial,
    /// Regular expression matches
    Regex,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Exact => "exact",
            SearchMode::Partial => "partial",
            SearchMode::Regex => "regex",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(SearchMode::Exact),
            "partial" => Ok(SearchMode::Partial),
            "regex" => Ok(SearchMode::Regex),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Where a hit sits relative to the segment that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitPosition {
    /// Begins within the segment's first word
    Start,
    /// Ends within the segment's last word
    End,
    /// Runs past the end of the segment
    Cross,
}

impl HitPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            HitPosition::Start => "start",
            HitPosition::End => "end",
            HitPosition::Cross => "cross",
        }
    }
}

impl fmt::Display for HitPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HitPosition {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(HitPosition::Start),
            "end" => Ok(HitPosition::End),
            "cross" => Ok(HitPosition::Cross),
            other => Err(ConfigError::UnknownPosition(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str, char_offset: usize) -> Segment {
        Segment {
            doc_id: 1,
            segment_id: 0,
            text: text.to_string(),
            avg_logprob: None,
            char_offset,
            start_time: 1.0,
            end_time: 3.5,
        }
    }

    #[test]
    fn test_segment_lengths_count_chars_not_bytes() {
        let seg = segment("שלום", 5);
        assert_eq!(seg.text.len(), 8);
        assert_eq!(seg.char_len(), 4);
        assert_eq!(seg.char_end(), 9);
        assert_eq!(seg.duration(), 2.5);
    }

    #[test]
    fn test_search_mode_parse() {
        assert_eq!("exact".parse::<SearchMode>().unwrap(), SearchMode::Exact);
        assert_eq!("Partial".parse::<SearchMode>().unwrap(), SearchMode::Partial);
        assert_eq!("REGEX".parse::<SearchMode>().unwrap(), SearchMode::Regex);
        assert!("fuzzy".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_search_mode_serde_is_lowercase() {
        let json = serde_json::to_string(&SearchMode::Partial).unwrap();
        assert_eq!(json, "\"partial\"");
        let mode: SearchMode = serde_json::from_str("\"regex\"").unwrap();
        assert_eq!(mode, SearchMode::Regex);
    }

    #[test]
    fn test_hit_position_parse() {
        assert_eq!("start".parse::<HitPosition>().unwrap(), HitPosition::Start);
        assert_eq!("cross".parse::<HitPosition>().unwrap(), HitPosition::Cross);
        assert!(matches!(
            "middle".parse::<HitPosition>(),
            Err(ConfigError::UnknownPosition(_))
        ));
    }

    #[test]
    fn test_episode_record_binds_doc_id() {
        let record = EpisodeRecord {
            uuid: "u-1".to_string(),
            source: "podcast".to_string(),
            episode: "podcast/ep1".to_string(),
            episode_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            episode_title: "ep1".to_string(),
            full_text: "a b".to_string(),
            segments: vec![
                SegmentRecord {
                    text: "a".to_string(),
                    avg_logprob: Some(-0.2),
                    char_offset: 0,
                    start_time: 0.0,
                    end_time: 1.0,
                },
                SegmentRecord {
                    text: "b".to_string(),
                    avg_logprob: None,
                    char_offset: 2,
                    start_time: 1.0,
                    end_time: 2.0,
                },
            ],
        };

        let doc = record.document(7);
        assert_eq!(doc.doc_id, 7);
        assert_eq!(doc.uuid, "u-1");

        let segments: Vec<Segment> = record.segments(7).collect();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].doc_id, 7);
        assert_eq!(segments[1].segment_id, 1);
        assert_eq!(segments[1].char_offset, 2);
    }
}
