//! Index build pipeline
//!
//! Discovery, then a bounded pool of parse workers feeding a single writer
//! over bounded channels, then index finalisation. The store is reset at the
//! start of every build, so an interrupted build is simply run again.

use crossbeam::channel::bounded;
use explore_core::{parse_transcript_file, ConfigError, EpisodeRecord, FileError, ParseError};
use explore_store::{rebuild_indexes, reset_store, Store, StoreError, StoreMode};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::discovery;
use crate::writer::{BatchWriter, WriterStats};

type ParseResult = Result<EpisodeRecord, ParseError>;

/// Index builder errors
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Data directory not found: {0}")]
    DataDirNotFound(PathBuf),

    #[error("Store was opened read-only")]
    ReadOnlyStore,

    #[error("Invalid build configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Parser panicked on {}", .0.display())]
    ParsePanicked(PathBuf),

    #[error("A parse worker exited before every file was written")]
    WorkerPanicked,
}

/// Build pipeline settings
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Parse worker threads
    pub workers: usize,
    /// Flush after this many pending documents
    pub doc_flush_threshold: usize,
    /// Flush after this many pending segments
    pub segment_flush_threshold: usize,
    /// Capacity of each channel; 0 means twice the worker count
    pub channel_capacity: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            workers: 16,
            doc_flush_threshold: 1000,
            segment_flush_threshold: 30_000,
            channel_capacity: 0,
        }
    }
}

impl BuildConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_doc_flush_threshold(mut self, n: usize) -> Self {
        self.doc_flush_threshold = n;
        self
    }

    pub fn with_segment_flush_threshold(mut self, n: usize) -> Self {
        self.segment_flush_threshold = n;
        self
    }

    pub fn with_channel_capacity(mut self, n: usize) -> Self {
        self.channel_capacity = n;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("workers", self.workers),
            ("doc_flush_threshold", self.doc_flush_threshold),
            ("segment_flush_threshold", self.segment_flush_threshold),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidSetting {
                    name,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Files allowed between dispatch and write
    fn reorder_window(&self) -> usize {
        self.capacity() + self.workers
    }

    fn capacity(&self) -> usize {
        if self.channel_capacity == 0 {
            self.workers * 2
        } else {
            self.channel_capacity
        }
    }
}

/// Outcome of a build
#[derive(Debug, Default)]
pub struct BuildReport {
    pub files_discovered: usize,
    pub documents_indexed: usize,
    pub segments_indexed: usize,
    /// Files that could not be indexed, with the reason
    pub files_skipped: Vec<FileError>,
    /// Most parsed files held at once while waiting for an earlier file
    pub peak_reordered: usize,
    pub elapsed: Duration,
}

/// Progress notification sent after each accepted document
#[derive(Debug, Clone, Copy)]
pub struct BuildProgress<'a> {
    pub path: &'a Path,
    /// Documents accepted so far
    pub accepted: usize,
    /// Files discovered
    pub total: usize,
}

/// Build the store from every transcript under `data_dir`
pub fn build(store: &Store, data_dir: &Path, config: &BuildConfig) -> Result<BuildReport, IndexerError> {
    build_with_progress(store, data_dir, config, |_| {})
}

/// Build the store, reporting progress to `on_progress`
#[instrument(skip_all, fields(data_dir = %data_dir.display()))]
pub fn build_with_progress<F>(
    store: &Store,
    data_dir: &Path,
    config: &BuildConfig,
    on_progress: F,
) -> Result<BuildReport, IndexerError>
where
    F: FnMut(&BuildProgress<'_>),
{
    build_with_parser(store, data_dir, config, parse_transcript_file, on_progress)
}

fn build_with_parser<P, F>(
    store: &Store,
    data_dir: &Path,
    config: &BuildConfig,
    parse: P,
    mut on_progress: F,
) -> Result<BuildReport, IndexerError>
where
    P: Fn(&Path, &Path) -> ParseResult + Sync,
    F: FnMut(&BuildProgress<'_>),
{
    config.validate()?;
    if store.mode() != StoreMode::ReadWrite {
        return Err(IndexerError::ReadOnlyStore);
    }
    if !data_dir.is_dir() {
        return Err(IndexerError::DataDirNotFound(data_dir.to_path_buf()));
    }

    let started = Instant::now();
    let files = discovery::find_transcript_files(data_dir);
    let total = files.len();
    info!(files = total, workers = config.workers, "starting index build");

    let mut conn = store.connect()?;
    reset_store(&conn)?;

    let mut skipped: Vec<FileError> = Vec::new();
    let capacity = config.capacity();
    let window = config.reorder_window();
    let mut peak_reordered = 0usize;
    let parse = &parse;

    let stats = thread::scope(|scope| -> Result<WriterStats, IndexerError> {
        let (path_tx, path_rx) = bounded::<(usize, PathBuf)>(capacity);
        let (parsed_tx, parsed_rx) = bounded::<(usize, PathBuf, Option<ParseResult>)>(capacity);
        // One token per file between dispatch and write; caps the reorder buffer
        let (slot_tx, slot_rx) = bounded::<()>(window);

        scope.spawn(move || {
            for item in files.into_iter().enumerate() {
                if slot_tx.send(()).is_err() || path_tx.send(item).is_err() {
                    break;
                }
            }
        });

        let workers: Vec<_> = (0..config.workers)
            .map(|_| {
                let path_rx = path_rx.clone();
                let parsed_tx = parsed_tx.clone();
                scope.spawn(move || {
                    for (seq, path) in path_rx.iter() {
                        // A panic is reported as `None` so the writer never waits on a lost file
                        let parsed = panic::catch_unwind(AssertUnwindSafe(|| parse(data_dir, &path))).ok();
                        if parsed_tx.send((seq, path, parsed)).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        drop(path_rx);
        drop(parsed_tx);

        let mut writer = BatchWriter::new(&mut conn, config.doc_flush_threshold, config.segment_flush_threshold);
        let mut accepted = 0usize;

        // Workers finish out of order; files are written in discovery order so
        // doc ids and duplicate resolution do not depend on thread timing
        let mut reorder: BTreeMap<usize, (PathBuf, Option<ParseResult>)> = BTreeMap::new();
        let mut next_seq = 0usize;

        // Returning early drops the receivers, which unblocks and stops the
        // feeder and the workers; pending records are never committed
        for (seq, path, parsed) in parsed_rx.iter() {
            reorder.insert(seq, (path, parsed));
            peak_reordered = peak_reordered.max(reorder.len());

            while let Some((path, parsed)) = reorder.remove(&next_seq) {
                next_seq += 1;
                let _ = slot_rx.try_recv();

                let record = match parsed {
                    Some(Ok(record)) => record,
                    Some(Err(error)) => {
                        warn!(path = %path.display(), %error, "skipping transcript");
                        skipped.push(FileError::new(path, error));
                        continue;
                    }
                    None => return Err(IndexerError::ParsePanicked(path)),
                };

                let episode = record.episode.clone();
                match writer.push(record)? {
                    Some(_) => {
                        accepted += 1;
                        on_progress(&BuildProgress {
                            path: &path,
                            accepted,
                            total,
                        });
                    }
                    None => {
                        warn!(path = %path.display(), %episode, "skipping duplicate episode");
                        skipped.push(FileError::new(path, ParseError::Duplicate(episode)));
                    }
                }
            }
        }

        if !reorder.is_empty() || next_seq != total {
            return Err(IndexerError::WorkerPanicked);
        }

        let stats = writer.finish()?;

        for worker in workers {
            if worker.join().is_err() {
                return Err(IndexerError::WorkerPanicked);
            }
        }

        Ok(stats)
    })?;

    rebuild_indexes(&conn)?;

    let report = BuildReport {
        files_discovered: total,
        documents_indexed: stats.documents,
        segments_indexed: stats.segments,
        files_skipped: skipped,
        peak_reordered,
        elapsed: started.elapsed(),
    };

    info!(
        documents = report.documents_indexed,
        segments = report.segments_indexed,
        skipped = report.files_skipped.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "index build complete"
    );

    Ok(report)
}
