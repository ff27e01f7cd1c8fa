//! Store-backed offset resolution and lookups

use explore_core::{locate_segment, DocId, Document, Segment};
use explore_store::MAX_BOUND_PARAMS;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::engine::SearchEngine;
use crate::error::QueryError;

const DOCUMENT_COLUMNS: &str = "doc_id, uuid, source, episode, episode_date, episode_title";

const SEGMENT_COLUMNS: &str =
    "doc_id, segment_id, segment_text, avg_logprob, char_offset, start_time, end_time";

/// Addresses one segment of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentLocator {
    /// The segment containing this character offset of the document text
    CharOffset(usize),
    /// The segment with this 0-based index
    SegmentIndex(i64),
}

fn row_to_document(row: &Row) -> rusqlite::Result<Document> {
    Ok(Document {
        doc_id: row.get(0)?,
        uuid: row.get(1)?,
        source: row.get(2)?,
        episode: row.get(3)?,
        episode_date: row.get(4)?,
        episode_title: row.get(5)?,
    })
}

fn row_to_segment(row: &Row) -> rusqlite::Result<Segment> {
    Ok(Segment {
        doc_id: row.get(0)?,
        segment_id: row.get(1)?,
        text: row.get(2)?,
        avg_logprob: row.get(3)?,
        char_offset: row.get::<_, i64>(4)? as usize,
        start_time: row.get(5)?,
        end_time: row.get(6)?,
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub(crate) fn load_document(conn: &Connection, doc_id: DocId) -> Result<Option<Document>, QueryError> {
    let sql = format!("SELECT {} FROM documents WHERE doc_id = ?1", DOCUMENT_COLUMNS);
    let doc = conn
        .prepare_cached(&sql)?
        .query_row([doc_id], row_to_document)
        .optional()?;
    Ok(doc)
}

pub(crate) fn load_document_by_uuid(conn: &Connection, uuid: &str) -> Result<Option<Document>, QueryError> {
    let sql = format!("SELECT {} FROM documents WHERE uuid = ?1", DOCUMENT_COLUMNS);
    let doc = conn
        .prepare_cached(&sql)?
        .query_row([uuid], row_to_document)
        .optional()?;
    Ok(doc)
}

/// Documents for a set of ids, keyed by id; unknown ids are absent
pub(crate) fn load_documents(conn: &Connection, doc_ids: &[DocId]) -> Result<HashMap<DocId, Document>, QueryError> {
    let mut documents = HashMap::with_capacity(doc_ids.len());
    for chunk in doc_ids.chunks(MAX_BOUND_PARAMS) {
        let sql = format!(
            "SELECT {} FROM documents WHERE doc_id IN ({})",
            DOCUMENT_COLUMNS,
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), row_to_document)?;
        for row in rows {
            let doc = row?;
            documents.insert(doc.doc_id, doc);
        }
    }
    Ok(documents)
}

pub(crate) fn load_text(conn: &Connection, doc_id: DocId) -> Result<String, QueryError> {
    conn.prepare_cached("SELECT full_text FROM documents WHERE doc_id = ?1")?
        .query_row([doc_id], |row| row.get(0))
        .optional()?
        .ok_or_else(|| QueryError::NotFound(format!("document {}", doc_id)))
}

/// Full texts for a set of ids, in id order
pub(crate) fn load_texts(conn: &Connection, doc_ids: &[DocId]) -> Result<Vec<(DocId, String)>, QueryError> {
    let mut texts = Vec::with_capacity(doc_ids.len());
    for chunk in doc_ids.chunks(MAX_BOUND_PARAMS) {
        let sql = format!(
            "SELECT doc_id, full_text FROM documents WHERE doc_id IN ({}) ORDER BY doc_id",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| Ok((row.get(0)?, row.get(1)?)))?;
        for row in rows {
            texts.push(row?);
        }
    }
    Ok(texts)
}

/// All segments of a document, ordered by position
pub(crate) fn load_segments(conn: &Connection, doc_id: DocId) -> Result<Vec<Segment>, QueryError> {
    let sql = format!(
        "SELECT {} FROM segments WHERE doc_id = ?1 ORDER BY segment_id",
        SEGMENT_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map([doc_id], row_to_segment)?;

    let mut segments = Vec::new();
    for row in rows {
        segments.push(row?);
    }
    Ok(segments)
}

fn locate(segments: &[Segment], doc_id: DocId, locator: SegmentLocator) -> Result<Segment, QueryError> {
    let found = match locator {
        SegmentLocator::CharOffset(offset) => locate_segment(segments, offset).map(|i| &segments[i]),
        SegmentLocator::SegmentIndex(index) => usize::try_from(index).ok().and_then(|i| segments.get(i)),
    };
    found.cloned().ok_or_else(|| {
        QueryError::NotFound(match locator {
            SegmentLocator::CharOffset(offset) => format!("offset {} in document {}", offset, doc_id),
            SegmentLocator::SegmentIndex(index) => format!("segment {} in document {}", index, doc_id),
        })
    })
}

impl SearchEngine {
    /// Get a document by id
    pub fn document(&self, doc_id: DocId) -> Result<Document, QueryError> {
        let conn = self.store().reader()?;
        load_document(&conn, doc_id)?.ok_or_else(|| QueryError::NotFound(format!("document {}", doc_id)))
    }

    /// Get a document by its external uuid
    pub fn document_by_uuid(&self, uuid: &str) -> Result<Document, QueryError> {
        let conn = self.store().reader()?;
        load_document_by_uuid(&conn, uuid)?.ok_or_else(|| QueryError::NotFound(format!("document {}", uuid)))
    }

    /// Get the full text of a document
    pub fn document_text(&self, doc_id: DocId) -> Result<String, QueryError> {
        let conn = self.store().reader()?;
        load_text(&conn, doc_id)
    }

    /// All segments of a document
    pub fn segments(&self, doc_id: DocId) -> Result<Vec<Segment>, QueryError> {
        let conn = self.store().reader()?;
        let segments = load_segments(&conn, doc_id)?;
        if segments.is_empty() && load_document(&conn, doc_id)?.is_none() {
            return Err(QueryError::NotFound(format!("document {}", doc_id)));
        }
        Ok(segments)
    }

    /// The segment containing a character offset of a document
    pub fn resolve_offset(&self, doc_id: DocId, char_offset: usize) -> Result<Segment, QueryError> {
        let conn = self.store().reader()?;
        let segments = load_segments(&conn, doc_id)?;
        locate(&segments, doc_id, SegmentLocator::CharOffset(char_offset))
    }

    /// Resolve many `(doc_id, char_offset)` pairs, in input order
    ///
    /// Each distinct document's segments are fetched once.
    pub fn resolve_offsets(&self, offsets: &[(DocId, usize)]) -> Result<Vec<Segment>, QueryError> {
        let conn = self.store().reader()?;
        let mut cache: HashMap<DocId, Vec<Segment>> = HashMap::new();
        let mut resolved = Vec::with_capacity(offsets.len());

        for &(doc_id, char_offset) in offsets {
            if !cache.contains_key(&doc_id) {
                cache.insert(doc_id, load_segments(&conn, doc_id)?);
            }
            let segments = &cache[&doc_id];
            resolved.push(locate(segments, doc_id, SegmentLocator::CharOffset(char_offset))?);
        }
        Ok(resolved)
    }

    /// Fetch segments by `(doc_id, segment_id)`; missing pairs are skipped
    pub fn segments_by_ids(&self, ids: &[(DocId, i64)]) -> Result<Vec<Segment>, QueryError> {
        let conn = self.store().reader()?;
        let sql = format!(
            "SELECT {} FROM segments WHERE doc_id = ?1 AND segment_id = ?2",
            SEGMENT_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql)?;

        let mut segments = Vec::with_capacity(ids.len());
        for &(doc_id, segment_id) in ids {
            if let Some(segment) = stmt
                .query_row([doc_id, segment_id], row_to_segment)
                .optional()?
            {
                segments.push(segment);
            }
        }
        Ok(segments)
    }

    /// Resolve a segment of the document with this uuid
    pub fn resolve_segment(&self, uuid: &str, locator: SegmentLocator) -> Result<Segment, QueryError> {
        let mut resolved = self.resolve_segments(&[(uuid, locator)])?;
        resolved
            .pop()
            .ok_or_else(|| QueryError::NotFound(format!("document {}", uuid)))
    }

    /// Resolve many `(uuid, locator)` requests, in input order
    pub fn resolve_segments(&self, requests: &[(&str, SegmentLocator)]) -> Result<Vec<Segment>, QueryError> {
        let conn = self.store().reader()?;
        let mut cache: HashMap<&str, (DocId, Vec<Segment>)> = HashMap::new();
        let mut resolved = Vec::with_capacity(requests.len());

        for &(uuid, locator) in requests {
            if !cache.contains_key(uuid) {
                let doc = load_document_by_uuid(&conn, uuid)?
                    .ok_or_else(|| QueryError::NotFound(format!("document {}", uuid)))?;
                let segments = load_segments(&conn, doc.doc_id)?;
                cache.insert(uuid, (doc.doc_id, segments));
            }
            let (doc_id, segments) = &cache[uuid];
            resolved.push(locate(segments, *doc_id, locator)?);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{engine_with, episode};
    use explore_core::SEGMENT_SEPARATOR;

    #[test]
    fn test_resolve_offset_covers_whole_document() {
        let (_temp, engine) = engine_with(vec![episode("radio", "ep1", None, &["שלום עולם", "מה שלומך", "טוב"])]);
        let doc = engine.document_by_uuid("radio/ep1").unwrap();
        let text = engine.document_text(doc.doc_id).unwrap();
        let len = text.chars().count();
        let segments = engine.segments(doc.doc_id).unwrap();

        for c in 0..len {
            let segment = engine.resolve_offset(doc.doc_id, c).unwrap();
            assert!(segment.char_offset <= c);
            assert!(c < segment.char_end() + SEGMENT_SEPARATOR.chars().count());
        }
        assert_eq!(engine.resolve_offset(doc.doc_id, 0).unwrap(), segments[0]);
        assert_eq!(engine.resolve_offset(doc.doc_id, len - 1).unwrap(), segments[2]);
        assert!(matches!(
            engine.resolve_offset(doc.doc_id, len),
            Err(QueryError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_offsets_batch() {
        let (_temp, engine) = engine_with(vec![
            episode("radio", "ep1", None, &["אחת", "שתיים"]),
            episode("radio", "ep2", None, &["שלוש"]),
        ]);
        let one = engine.document_by_uuid("radio/ep1").unwrap().doc_id;
        let two = engine.document_by_uuid("radio/ep2").unwrap().doc_id;

        let resolved = engine.resolve_offsets(&[(one, 4), (two, 0), (one, 0)]).unwrap();
        assert_eq!(
            resolved.iter().map(|s| s.text.as_str()).collect::<Vec<_>>(),
            vec!["שתיים", "שלוש", "אחת"]
        );
        assert!(engine.resolve_offsets(&[(one, 0), (999, 0)]).is_err());
    }

    #[test]
    fn test_segments_by_ids_skips_missing() {
        let (_temp, engine) = engine_with(vec![episode("radio", "ep1", None, &["a", "b", "c"])]);
        let doc_id = engine.document_by_uuid("radio/ep1").unwrap().doc_id;

        let segments = engine
            .segments_by_ids(&[(doc_id, 2), (doc_id, 7), (999, 0), (doc_id, 0)])
            .unwrap();
        assert_eq!(
            segments.iter().map(|s| s.segment_id).collect::<Vec<_>>(),
            vec![2, 0]
        );
    }

    #[test]
    fn test_resolve_segment_by_uuid() {
        let (_temp, engine) = engine_with(vec![episode("radio", "ep1", None, &["שלום עולם", "מה שלומך"])]);

        let by_offset = engine
            .resolve_segment("radio/ep1", SegmentLocator::CharOffset(12))
            .unwrap();
        assert_eq!(by_offset.segment_id, 1);
        assert_eq!(by_offset.start_time, 1.0);

        let by_index = engine
            .resolve_segment("radio/ep1", SegmentLocator::SegmentIndex(0))
            .unwrap();
        assert_eq!(by_index.text, "שלום עולם");

        assert!(matches!(
            engine.resolve_segment("radio/ep1", SegmentLocator::SegmentIndex(5)),
            Err(QueryError::NotFound(_))
        ));
        assert!(matches!(
            engine.resolve_segment("radio/ep1", SegmentLocator::SegmentIndex(-1)),
            Err(QueryError::NotFound(_))
        ));
        assert!(matches!(
            engine.resolve_segment("nope", SegmentLocator::SegmentIndex(0)),
            Err(QueryError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_segments_batch() {
        let (_temp, engine) = engine_with(vec![
            episode("radio", "ep1", None, &["אחת", "שתיים"]),
            episode("tv", "ep1", None, &["שלוש"]),
        ]);

        let resolved = engine
            .resolve_segments(&[
                ("radio/ep1", SegmentLocator::SegmentIndex(1)),
                ("tv/ep1", SegmentLocator::CharOffset(0)),
                ("radio/ep1", SegmentLocator::CharOffset(0)),
            ])
            .unwrap();
        assert_eq!(
            resolved.iter().map(|s| s.text.as_str()).collect::<Vec<_>>(),
            vec!["שתיים", "שלוש", "אחת"]
        );
    }

    #[test]
    fn test_unknown_document_lookups() {
        let (_temp, engine) = engine_with(vec![episode("radio", "ep1", None, &["a"])]);
        assert!(matches!(engine.document(42), Err(QueryError::NotFound(_))));
        assert!(matches!(engine.document_text(42), Err(QueryError::NotFound(_))));
        assert!(matches!(engine.segments(42), Err(QueryError::NotFound(_))));
        assert!(matches!(engine.document_by_uuid("x"), Err(QueryError::NotFound(_))));
    }
}
