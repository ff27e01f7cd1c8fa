//! Single batched writer
//!
//! Exactly one writer owns the read-write connection during a build. Parsed
//! episodes are queued in memory and committed in one transaction per flush:
//! documents, segments and both full-text rows of an episode always land
//! together.

use explore_core::{DocId, EpisodeRecord};
use explore_store::schema::{DOCUMENTS, DOCUMENTS_FTS, DOCUMENTS_TRIGRAM, SEGMENTS};
use explore_store::{batch_insert, with_transaction, DocumentRow, FullTextRow, SegmentRow, StoreError};
use rusqlite::Connection;
use std::collections::HashSet;
use tracing::debug;

/// Totals written so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub documents: usize,
    pub segments: usize,
    pub flushes: usize,
}

/// Accumulates episodes and flushes them in batches
pub struct BatchWriter<'c> {
    conn: &'c mut Connection,
    doc_threshold: usize,
    segment_threshold: usize,
    next_doc_id: DocId,
    pending: Vec<(DocId, EpisodeRecord)>,
    pending_segments: usize,
    seen_uuids: HashSet<String>,
    seen_episodes: HashSet<(String, String)>,
    stats: WriterStats,
}

impl<'c> BatchWriter<'c> {
    /// Flush once `doc_threshold` documents or `segment_threshold` segments
    /// are pending, whichever comes first
    pub fn new(conn: &'c mut Connection, doc_threshold: usize, segment_threshold: usize) -> Self {
        Self {
            conn,
            doc_threshold: doc_threshold.max(1),
            segment_threshold: segment_threshold.max(1),
            next_doc_id: 1,
            pending: Vec::new(),
            pending_segments: 0,
            seen_uuids: HashSet::new(),
            seen_episodes: HashSet::new(),
            stats: WriterStats::default(),
        }
    }

    /// Queue an episode, flushing when a threshold is reached
    ///
    /// Returns the assigned document id, or `None` when an episode with the
    /// same uuid or the same (source, episode) was already accepted.
    pub fn push(&mut self, record: EpisodeRecord) -> Result<Option<DocId>, StoreError> {
        let key = (record.source.clone(), record.episode.clone());
        if self.seen_uuids.contains(&record.uuid) || self.seen_episodes.contains(&key) {
            return Ok(None);
        }
        self.seen_uuids.insert(record.uuid.clone());
        self.seen_episodes.insert(key);

        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;
        self.pending_segments += record.segments.len();
        self.pending.push((doc_id, record));

        if self.pending.len() >= self.doc_threshold || self.pending_segments >= self.segment_threshold {
            self.flush()?;
        }

        Ok(Some(doc_id))
    }

    /// Commit everything pending in one transaction
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.pending);
        let (documents, segments) = with_transaction(self.conn, |tx| write_batch(tx, &pending))?;

        self.pending_segments = 0;
        self.stats.documents += documents;
        self.stats.segments += segments;
        self.stats.flushes += 1;

        debug!(
            documents,
            segments,
            total_documents = self.stats.documents,
            "flushed batch"
        );
        Ok(())
    }

    /// Flush the tail and return the totals
    pub fn finish(mut self) -> Result<WriterStats, StoreError> {
        self.flush()?;
        Ok(self.stats)
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

fn write_batch(conn: &Connection, pending: &[(DocId, EpisodeRecord)]) -> Result<(usize, usize), StoreError> {
    let documents: Vec<DocumentRow> = pending
        .iter()
        .map(|(doc_id, r)| DocumentRow {
            doc_id: *doc_id,
            uuid: &r.uuid,
            source: &r.source,
            episode: &r.episode,
            episode_date: r.episode_date,
            episode_title: &r.episode_title,
            full_text: &r.full_text,
        })
        .collect();

    let segments: Vec<SegmentRow> = pending
        .iter()
        .flat_map(|(doc_id, r)| {
            r.segments.iter().enumerate().map(move |(i, s)| SegmentRow {
                doc_id: *doc_id,
                segment_id: i as i64,
                text: &s.text,
                avg_logprob: s.avg_logprob,
                char_offset: s.char_offset as i64,
                start_time: s.start_time,
                end_time: s.end_time,
            })
        })
        .collect();

    let full_text: Vec<FullTextRow> = pending
        .iter()
        .map(|(doc_id, r)| FullTextRow {
            doc_id: *doc_id,
            text: &r.full_text,
        })
        .collect();

    let written = batch_insert(conn, &DOCUMENTS, &documents)?;
    let segment_count = batch_insert(conn, &SEGMENTS, &segments)?;
    batch_insert(conn, &DOCUMENTS_FTS, &full_text)?;
    batch_insert(conn, &DOCUMENTS_TRIGRAM, &full_text)?;

    Ok((written, segment_count))
}
