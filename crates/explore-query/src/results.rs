//! Search requests and results

use chrono::NaiveDate;
use explore_core::{ConfigError, DocId, HitPosition, SearchFilters, SearchMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest page a single search may return
pub const MAX_PAGE_SIZE: usize = 1000;

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Matching switches that refine a mode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Treat any run of punctuation and whitespace between query words as a
    /// single gap (exact and partial modes only)
    #[serde(default)]
    pub ignore_punct: bool,
    /// Keep only matches at these positions of their segment (empty keeps all)
    #[serde(default)]
    pub positions: Vec<HitPosition>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignore_punct(mut self, ignore: bool) -> Self {
        self.ignore_punct = ignore;
        self
    }

    pub fn with_positions<I: IntoIterator<Item = HitPosition>>(mut self, positions: I) -> Self {
        self.positions = positions.into_iter().collect();
        self
    }
}

/// One search call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub options: SearchOptions,
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            query: query.into(),
            mode,
            filters: SearchFilters::default(),
            options: SearchOptions::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    /// Check paging and filters; the query itself is checked when it is planned
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page == 0 {
            return Err(ConfigError::InvalidPage(self.page));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidPageSize {
                got: self.page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        self.filters.validate()
    }

    /// Index of the first entry on the requested page
    pub(crate) fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// A verified occurrence in a document's full text, as character offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Match {
    pub doc_id: DocId,
    pub char_start: usize,
    pub char_end: usize,
}

/// One result entry: the segment owning the first occurrence of a group of
/// matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub doc_id: DocId,
    pub uuid: String,
    pub source: String,
    pub episode: String,
    pub episode_title: String,
    pub episode_date: Option<NaiveDate>,
    pub segment_id: i64,
    /// Character offset of the first folded match in the document text
    pub char_offset: usize,
    /// Character offset of the owning segment in the document text
    pub segment_char_offset: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub matched_text: String,
    pub segment_text: String,
    /// Matches folded into this entry
    pub match_count: usize,
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub mode: SearchMode,
    pub hits: Vec<Hit>,
    pub total_results: usize,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
}

impl SearchResult {
    /// Hits of this page grouped by episode, in first-occurrence order
    pub fn episodes(&self) -> Vec<EpisodeHits<'_>> {
        let mut groups: Vec<EpisodeHits<'_>> = Vec::new();
        for hit in &self.hits {
            match groups
                .iter_mut()
                .find(|g| g.source == hit.source && g.episode == hit.episode)
            {
                Some(group) => group.hits.push(hit),
                None => groups.push(EpisodeHits {
                    source: &hit.source,
                    episode: &hit.episode,
                    episode_title: &hit.episode_title,
                    episode_date: hit.episode_date,
                    hits: vec![hit],
                }),
            }
        }
        groups
    }

    /// Number of pages for the whole result set
    pub fn total_pages(&self) -> usize {
        self.total_results.div_ceil(self.page_size.max(1))
    }
}

/// Hits of one episode on a result page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeHits<'a> {
    pub source: &'a str,
    pub episode: &'a str,
    pub episode_title: &'a str,
    pub episode_date: Option<NaiveDate>,
    pub hits: Vec<&'a Hit>,
}

/// Inclusive range of episode dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

impl DateRange {
    /// Widen the range to include `date`
    pub(crate) fn include(range: Option<Self>, date: NaiveDate) -> Option<Self> {
        Some(match range {
            None => DateRange { min: date, max: date },
            Some(r) => DateRange {
                min: r.min.min(date),
                max: r.max.max(date),
            },
        })
    }
}

/// Filter options available for a query over its whole, unfiltered result set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchMetadata {
    /// Result entries per source
    pub sources: BTreeMap<String, usize>,
    /// Date range of the result entries that carry a date
    pub date_range: Option<DateRange>,
    pub total_results: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(source: &str, episode: &str, segment_id: i64) -> Hit {
        Hit {
            doc_id: 1,
            uuid: format!("{}/{}", source, episode),
            source: source.to_string(),
            episode: episode.to_string(),
            episode_title: episode.to_string(),
            episode_date: None,
            segment_id,
            char_offset: 0,
            segment_char_offset: 0,
            start_time: 0.0,
            end_time: 1.0,
            matched_text: "x".to_string(),
            segment_text: "x".to_string(),
            match_count: 1,
        }
    }

    #[test]
    fn test_request_validation() {
        assert!(SearchRequest::new("q", SearchMode::Exact).validate().is_ok());
        assert_eq!(
            SearchRequest::new("q", SearchMode::Exact).with_page(0, 10).validate(),
            Err(ConfigError::InvalidPage(0))
        );
        assert_eq!(
            SearchRequest::new("q", SearchMode::Exact)
                .with_page(1, MAX_PAGE_SIZE + 1)
                .validate(),
            Err(ConfigError::InvalidPageSize {
                got: MAX_PAGE_SIZE + 1,
                max: MAX_PAGE_SIZE
            })
        );
        assert!(matches!(
            SearchRequest::new("q", SearchMode::Exact).with_page(1, 0).validate(),
            Err(ConfigError::InvalidPageSize { .. })
        ));
    }

    #[test]
    fn test_request_offset() {
        assert_eq!(SearchRequest::new("q", SearchMode::Exact).with_page(3, 20).offset(), 40);
    }

    #[test]
    fn test_episodes_group_in_first_occurrence_order() {
        let result = SearchResult {
            query: "x".to_string(),
            mode: SearchMode::Exact,
            hits: vec![hit("a", "a/1", 0), hit("b", "b/1", 0), hit("a", "a/1", 3)],
            total_results: 3,
            page: 1,
            page_size: 2,
            has_more: false,
        };

        let episodes = result.episodes();
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].episode, "a/1");
        assert_eq!(episodes[0].hits.len(), 2);
        assert_eq!(episodes[1].source, "b");
        assert_eq!(result.total_pages(), 2);
    }

    #[test]
    fn test_date_range_include() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let range = DateRange::include(None, d(10));
        let range = DateRange::include(range, d(3));
        let range = DateRange::include(range, d(7));
        assert_eq!(range, Some(DateRange { min: d(3), max: d(10) }));
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: SearchRequest =
            serde_json::from_str(r#"{"query": "שלום", "page": 1, "page_size": 10}"#).unwrap();
        assert_eq!(request.mode, SearchMode::Exact);
        assert!(request.filters.is_empty());
        assert!(!request.options.ignore_punct);
    }
}
