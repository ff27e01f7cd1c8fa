//! Search engine
//!
//! A search runs in four passes over one reader connection:
//!
//! 1. **Narrow** - the plan's full-text lookup yields candidate doc ids
//!    (or every document when the query cannot be narrowed).
//! 2. **Verify** - candidate texts are loaded in chunks and matched on the
//!    rayon pool; the cancellation token is checked between and within chunks.
//! 3. **Resolve** - each match's start offset is mapped to its owning segment,
//!    fetching a document's segments once, and position filters apply.
//! 4. **Group** - matches in the same segment or with overlapping ranges fold
//!    into one entry; source and date filters drop whole documents.
//!
//! `search` pages through the entries; `metadata` summarises all of them.

use explore_core::{
    byte_index, locate_segment, CharCursor, DocId, Document, HitPosition, SearchFilters, SearchMode, Segment,
};
use explore_store::{Store, StoreConfig, StoreMode};
use rayon::prelude::*;
use rusqlite::Connection;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::QueryError;
use crate::plan::{Narrowing, QueryPlan};
use crate::position::position_allowed;
use crate::resolver::{load_documents, load_segments, load_text, load_texts};
use crate::results::{DateRange, Hit, Match, SearchMetadata, SearchOptions, SearchRequest, SearchResult};

/// Documents whose texts are verified together
const VERIFY_CHUNK_DOCS: usize = 64;

/// Matches folded into one result entry
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResultEntry {
    /// Segment owning the first match
    pub segment: Segment,
    pub first: Match,
    /// Furthest end offset of any folded match
    pub span_end: usize,
    pub match_count: usize,
}

/// Result entries of one document, in offset order
#[derive(Debug)]
struct DocumentEntries {
    document: Document,
    entries: Vec<ResultEntry>,
}

/// Runs queries against a read-only store
///
/// Cheap to share between threads; every call checks out its own connection.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    store: Store,
    verify_chunk: usize,
}

impl SearchEngine {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            verify_chunk: VERIFY_CHUNK_DOCS,
        }
    }

    /// Open the store at `path` read-only
    pub fn open<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self, QueryError> {
        Ok(Self::new(Store::open(path, StoreMode::ReadOnly, config)?))
    }

    pub fn with_verify_chunk(mut self, docs: usize) -> Self {
        self.verify_chunk = docs.max(1);
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run a search
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResult, QueryError> {
        self.search_with_cancel(request, &CancellationToken::new())
    }

    /// Run a search that stops early once `cancel` fires
    #[instrument(skip_all, fields(mode = %request.mode, page = request.page))]
    pub fn search_with_cancel(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, QueryError> {
        let started = Instant::now();
        request.validate()?;
        let plan = QueryPlan::new(&request.query, request.mode, &request.options)?;

        let conn = self.store.reader()?;
        let groups = self.collect_entries(&conn, &plan, &request.options.positions, &request.filters, cancel)?;
        let total_results: usize = groups.iter().map(|g| g.entries.len()).sum();

        let page = groups
            .iter()
            .flat_map(|g| g.entries.iter().map(move |e| (&g.document, e)))
            .skip(request.offset())
            .take(request.page_size);

        let mut texts: HashMap<DocId, String> = HashMap::new();
        let mut hits = Vec::new();
        for (document, entry) in page {
            let text = match texts.entry(document.doc_id) {
                MapEntry::Occupied(e) => e.into_mut(),
                MapEntry::Vacant(e) => e.insert(load_text(&conn, document.doc_id)?),
            };
            hits.push(to_hit(document, entry, text));
        }

        let has_more = request.offset() + hits.len() < total_results;
        debug!(
            total_results,
            returned = hits.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search complete"
        );

        Ok(SearchResult {
            query: request.query.clone(),
            mode: request.mode,
            hits,
            total_results,
            page: request.page,
            page_size: request.page_size,
            has_more,
        })
    }

    /// Sources and date range over every result of a query, before filtering
    /// and pagination
    pub fn metadata(
        &self,
        query: &str,
        mode: SearchMode,
        options: &SearchOptions,
    ) -> Result<SearchMetadata, QueryError> {
        self.metadata_with_cancel(query, mode, options, &CancellationToken::new())
    }

    #[instrument(skip_all, fields(mode = %mode))]
    pub fn metadata_with_cancel(
        &self,
        query: &str,
        mode: SearchMode,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<SearchMetadata, QueryError> {
        let plan = QueryPlan::new(query, mode, options)?;
        let conn = self.store.reader()?;
        let groups = self.collect_entries(&conn, &plan, &options.positions, &SearchFilters::default(), cancel)?;

        let mut sources: BTreeMap<String, usize> = BTreeMap::new();
        let mut date_range = None;
        let mut total_results = 0;
        for group in &groups {
            *sources.entry(group.document.source.clone()).or_default() += group.entries.len();
            if let Some(date) = group.document.episode_date {
                date_range = DateRange::include(date_range, date);
            }
            total_results += group.entries.len();
        }

        Ok(SearchMetadata {
            sources,
            date_range,
            total_results,
        })
    }

    /// Every verified match of a query, before resolution and grouping
    pub fn find_matches(
        &self,
        query: &str,
        mode: SearchMode,
        options: &SearchOptions,
    ) -> Result<Vec<Match>, QueryError> {
        let plan = QueryPlan::new(query, mode, options)?;
        let conn = self.store.reader()?;
        self.verify(&conn, &plan, &CancellationToken::new())
    }

    fn collect_entries(
        &self,
        conn: &Connection,
        plan: &QueryPlan,
        positions: &[HitPosition],
        filters: &SearchFilters,
        cancel: &CancellationToken,
    ) -> Result<Vec<DocumentEntries>, QueryError> {
        let matches = self.verify(conn, plan, cancel)?;

        let mut doc_ids: Vec<DocId> = matches.iter().map(|m| m.doc_id).collect();
        doc_ids.dedup();
        let mut documents = load_documents(conn, &doc_ids)?;

        let mut groups = Vec::new();
        for doc_matches in matches.chunk_by(|a, b| a.doc_id == b.doc_id) {
            if cancel.is_cancelled() {
                return Err(QueryError::Cancelled);
            }
            let doc_id = doc_matches[0].doc_id;
            let Some(document) = documents.remove(&doc_id) else {
                continue;
            };
            if !filters.matches(&document) {
                continue;
            }

            let segments = load_segments(conn, doc_id)?;
            let entries = group_matches(doc_matches, &segments, positions);
            if !entries.is_empty() {
                groups.push(DocumentEntries { document, entries });
            }
        }

        Ok(groups)
    }

    /// Narrow, then verify candidate texts in parallel chunks
    fn verify(&self, conn: &Connection, plan: &QueryPlan, cancel: &CancellationToken) -> Result<Vec<Match>, QueryError> {
        let candidates = candidate_ids(conn, plan.narrowing())?;
        debug!(
            candidates = candidates.len(),
            narrowing = ?plan.narrowing(),
            "narrowed candidates"
        );

        let mut matches = Vec::new();
        for chunk in candidates.chunks(self.verify_chunk) {
            if cancel.is_cancelled() {
                return Err(QueryError::Cancelled);
            }
            let texts = load_texts(conn, chunk)?;
            let found: Vec<Vec<Match>> = texts
                .par_iter()
                .map(|(doc_id, text)| {
                    if cancel.is_cancelled() {
                        return Vec::new();
                    }
                    matches_in(plan, *doc_id, text)
                })
                .collect();
            if cancel.is_cancelled() {
                return Err(QueryError::Cancelled);
            }
            matches.extend(found.into_iter().flatten());
        }

        matches.sort_unstable();
        Ok(matches)
    }
}

fn candidate_ids(conn: &Connection, narrowing: &Narrowing) -> Result<Vec<DocId>, QueryError> {
    let mut ids = Vec::new();
    match narrowing.table() {
        None => {
            let mut stmt = conn.prepare_cached("SELECT doc_id FROM documents ORDER BY doc_id")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            for row in rows {
                ids.push(row?);
            }
        }
        Some((table, expr)) => {
            let sql = format!(
                "SELECT rowid FROM {table} WHERE {table} MATCH ?1 ORDER BY rowid",
                table = table
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map([expr], |row| row.get(0))?;
            for row in rows {
                ids.push(row?);
            }
        }
    }
    Ok(ids)
}

/// Matches of `plan` in one document's text, as character offsets
fn matches_in(plan: &QueryPlan, doc_id: DocId, text: &str) -> Vec<Match> {
    let mut starts = CharCursor::new(text);
    let mut ends = CharCursor::new(text);
    plan.find_in(text)
        .into_iter()
        .map(|(start, end)| Match {
            doc_id,
            char_start: starts.char_offset(start),
            char_end: ends.char_offset(end),
        })
        .collect()
}

/// Resolve one document's matches to segments and fold them into entries
///
/// `matches` must be sorted by offset and `segments` by position.
pub(crate) fn group_matches(matches: &[Match], segments: &[Segment], positions: &[HitPosition]) -> Vec<ResultEntry> {
    let mut entries: Vec<ResultEntry> = Vec::new();

    for m in matches {
        let Some(index) = locate_segment(segments, m.char_start) else {
            debug!(doc_id = m.doc_id, offset = m.char_start, "match outside segments");
            continue;
        };
        let segment = &segments[index];
        if !position_allowed(positions, segment, m.char_start, m.char_end) {
            continue;
        }

        match entries.last_mut() {
            Some(entry) if entry.segment.segment_id == segment.segment_id || m.char_start < entry.span_end => {
                entry.match_count += 1;
                entry.span_end = entry.span_end.max(m.char_end);
            }
            _ => entries.push(ResultEntry {
                segment: segment.clone(),
                first: *m,
                span_end: m.char_end,
                match_count: 1,
            }),
        }
    }

    entries
}

fn to_hit(document: &Document, entry: &ResultEntry, text: &str) -> Hit {
    let start = byte_index(text, entry.first.char_start);
    let end = byte_index(text, entry.first.char_end);
    Hit {
        doc_id: document.doc_id,
        uuid: document.uuid.clone(),
        source: document.source.clone(),
        episode: document.episode.clone(),
        episode_title: document.episode_title.clone(),
        episode_date: document.episode_date,
        segment_id: entry.segment.segment_id,
        char_offset: entry.first.char_start,
        segment_char_offset: entry.segment.char_offset,
        start_time: entry.segment.start_time,
        end_time: entry.segment.end_time,
        matched_text: text[start..end].to_string(),
        segment_text: entry.segment.text.clone(),
        match_count: entry.match_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{engine_with, episode};
    use chrono::NaiveDate;
    use explore_core::join_segments;

    fn segments(texts: &[&str]) -> Vec<Segment> {
        let (_, offsets) = join_segments(texts.iter().copied());
        texts
            .iter()
            .zip(offsets)
            .enumerate()
            .map(|(i, (text, char_offset))| Segment {
                doc_id: 1,
                segment_id: i as i64,
                text: text.to_string(),
                avg_logprob: None,
                char_offset,
                start_time: i as f64,
                end_time: i as f64 + 1.0,
            })
            .collect()
    }

    fn m(char_start: usize, char_end: usize) -> Match {
        Match {
            doc_id: 1,
            char_start,
            char_end,
        }
    }

    #[test]
    fn test_group_folds_same_segment() {
        // "aa bb aa" | "cc aa"
        let segs = segments(&["aa bb aa", "cc aa"]);
        let entries = group_matches(&[m(0, 2), m(6, 8), m(12, 14)], &segs, &[]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].match_count, 2);
        assert_eq!(entries[0].first, m(0, 2));
        assert_eq!(entries[1].segment.segment_id, 1);
        assert_eq!(entries[1].match_count, 1);
    }

    #[test]
    fn test_group_folds_overlap_across_segments() {
        // Match spanning into the next segment absorbs a match starting there
        let segs = segments(&["ab", "cd"]);
        let entries = group_matches(&[m(1, 4), m(3, 4)], &segs, &[]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].match_count, 2);
        assert_eq!(entries[0].span_end, 4);
    }

    #[test]
    fn test_group_applies_position_filter() {
        let segs = segments(&["aa bb aa"]);
        let entries = group_matches(&[m(0, 2), m(3, 5), m(6, 8)], &segs, &[HitPosition::End]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].first, m(6, 8));
        assert_eq!(entries[0].match_count, 1);
    }

    #[test]
    fn test_search_hebrew_exact() {
        let (_temp, engine) = engine_with(vec![
            episode("radio", "ep1", Some("2024-01-15"), &["שלום עולם", "מה שלומך עולם"]),
            episode("radio", "ep2", Some("2024-02-01"), &["עולמות אחרים"]),
        ]);

        let result = engine
            .search(&SearchRequest::new("עולם", SearchMode::Exact))
            .unwrap();
        assert_eq!(result.total_results, 2);
        assert!(!result.has_more);

        let first = &result.hits[0];
        assert_eq!(first.episode, "radio/ep1");
        assert_eq!(first.segment_id, 0);
        assert_eq!(first.char_offset, 5);
        assert_eq!(first.matched_text, "עולם");
        assert_eq!(first.start_time, 0.0);
        assert_eq!(first.episode_date, NaiveDate::from_ymd_opt(2024, 1, 15));

        let second = &result.hits[1];
        assert_eq!(second.segment_id, 1);
        assert_eq!(second.segment_text, "מה שלומך עולם");
        assert_eq!(second.segment_char_offset, 10);
        assert_eq!(second.char_offset - second.segment_char_offset, 9);
    }

    #[test]
    fn test_hit_offset_within_segment_points_at_match() {
        let (_temp, engine) = engine_with(vec![episode("radio", "ep1", None, &["בוקר", "שלומך שלום"])]);
        let result = engine
            .search(&SearchRequest::new("שלום", SearchMode::Exact))
            .unwrap();
        assert_eq!(result.total_results, 1);

        let hit = &result.hits[0];
        assert_eq!(hit.segment_char_offset, 5);
        let within = hit.char_offset - hit.segment_char_offset;
        assert_eq!(within, 6);
        let shown: String = hit.segment_text.chars().skip(within).take(4).collect();
        assert_eq!(shown, hit.matched_text);
        // The first substring occurrence is inside a longer word
        assert_eq!(hit.segment_text.find("שלום"), Some(0));
    }

    #[test]
    fn test_search_partial_finds_mid_word() {
        let (_temp, engine) = engine_with(vec![
            episode("radio", "ep1", None, &["שלום עולם"]),
            episode("radio", "ep2", None, &["עולמות אחרים"]),
        ]);
        let result = engine
            .search(&SearchRequest::new("עולם", SearchMode::Partial))
            .unwrap();
        assert_eq!(result.total_results, 2);
        assert_eq!(result.hits[1].matched_text, "עולם");
        assert_eq!(result.hits[1].episode, "radio/ep2");
    }

    #[test]
    fn test_search_regex() {
        let (_temp, engine) = engine_with(vec![episode("radio", "ep1", None, &["עלה 30 שקלים", "ירד ל-5 שקלים"])]);
        let result = engine
            .search(&SearchRequest::new(r"\d+ שקלים", SearchMode::Regex))
            .unwrap();
        assert_eq!(result.total_results, 2);
        assert_eq!(result.hits[0].matched_text, "30 שקלים");
        assert_eq!(result.hits[1].matched_text, "5 שקלים");
        assert_eq!(result.hits[1].segment_id, 1);

        let err = engine
            .search(&SearchRequest::new("(?<=x)", SearchMode::Regex))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidPattern { .. }));
    }

    #[test]
    fn test_search_filters() {
        let (_temp, engine) = engine_with(vec![
            episode("radio", "ep1", Some("2024-01-15"), &["חדשות הבוקר"]),
            episode("tv", "ep1", Some("2024-03-01"), &["חדשות הערב"]),
            episode("tv", "ep2", None, &["חדשות הלילה"]),
        ]);

        let request = SearchRequest::new("חדשות", SearchMode::Exact)
            .with_filters(SearchFilters::new().with_sources(["tv"]));
        let result = engine.search(&request).unwrap();
        assert_eq!(result.total_results, 2);

        let request = SearchRequest::new("חדשות", SearchMode::Exact).with_filters(
            SearchFilters::new()
                .with_date_from(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())
                .with_date_to(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
        );
        let result = engine.search(&request).unwrap();
        assert_eq!(result.total_results, 1);
        assert_eq!(result.hits[0].source, "tv");
        assert_eq!(result.hits[0].episode, "tv/ep1");
    }

    #[test]
    fn test_search_rejects_bad_requests() {
        let (_temp, engine) = engine_with(vec![episode("radio", "ep1", None, &["a"])]);
        assert!(matches!(
            engine.search(&SearchRequest::new(" ", SearchMode::Exact)),
            Err(QueryError::Configuration(_))
        ));
        assert!(matches!(
            engine.search(&SearchRequest::new("a", SearchMode::Exact).with_page(0, 10)),
            Err(QueryError::Configuration(_))
        ));
    }

    #[test]
    fn test_pagination() {
        let texts: Vec<String> = (0..7).map(|i| format!("מילה {}", i)).collect();
        let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
        let (_temp, engine) = engine_with(vec![episode("radio", "ep1", None, &texts)]);

        let page = |n| {
            engine
                .search(&SearchRequest::new("מילה", SearchMode::Exact).with_page(n, 3))
                .unwrap()
        };
        let (one, two, three, four) = (page(1), page(2), page(3), page(4));
        assert_eq!(one.total_results, 7);
        assert_eq!((one.hits.len(), one.has_more), (3, true));
        assert_eq!((two.hits.len(), two.has_more), (3, true));
        assert_eq!((three.hits.len(), three.has_more), (1, false));
        assert!(four.hits.is_empty());
        assert_eq!(two.hits[0].segment_id, 3);
    }

    #[test]
    fn test_metadata_counts_unfiltered_entries() {
        let (_temp, engine) = engine_with(vec![
            episode("radio", "ep1", Some("2024-01-15"), &["חדשות", "עוד חדשות"]),
            episode("tv", "ep1", Some("2023-06-01"), &["חדשות"]),
            episode("tv", "ep2", None, &["חדשות"]),
        ]);

        let meta = engine
            .metadata("חדשות", SearchMode::Exact, &SearchOptions::default())
            .unwrap();
        assert_eq!(meta.total_results, 4);
        assert_eq!(meta.sources.get("radio"), Some(&2));
        assert_eq!(meta.sources.get("tv"), Some(&2));
        assert_eq!(
            meta.date_range,
            Some(DateRange {
                min: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
                max: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            })
        );
    }

    #[test]
    fn test_find_matches_are_sorted_char_offsets() {
        let (_temp, engine) = engine_with(vec![
            episode("radio", "ep1", None, &["אבא אבא"]),
            episode("radio", "ep2", None, &["סבא ואבא"]),
        ]);
        let matches = engine
            .find_matches("אבא", SearchMode::Partial, &SearchOptions::default())
            .unwrap();
        let spans: Vec<(DocId, usize, usize)> = matches.iter().map(|m| (m.doc_id, m.char_start, m.char_end)).collect();
        assert_eq!(spans, vec![(1, 0, 3), (1, 4, 7), (2, 5, 8)]);
    }

    #[test]
    fn test_cancelled_search() {
        let (_temp, engine) = engine_with(vec![episode("radio", "ep1", None, &["שלום"])]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = engine
            .search_with_cancel(&SearchRequest::new("שלום", SearchMode::Exact), &cancel)
            .unwrap_err();
        assert!(matches!(err, QueryError::Cancelled));
    }

    #[test]
    fn test_small_verify_chunks_give_same_results() {
        let episodes = (0..10)
            .map(|i| episode("radio", &format!("ep{}", i), None, &["שלום עולם"]))
            .collect();
        let (_temp, engine) = engine_with(episodes);
        let request = SearchRequest::new("שלום", SearchMode::Exact).with_page(1, 100);

        let whole = engine.search(&request).unwrap();
        let chunked = engine.clone().with_verify_chunk(3).search(&request).unwrap();
        assert_eq!(whole.total_results, 10);
        assert_eq!(whole, chunked);
    }
}
