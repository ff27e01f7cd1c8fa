//! explore-query - Query engine for the explore transcript store
//!
//! Opens the store read-only and turns a query into time-resolved hits under
//! three matching modes (exact, partial, regex), with source and date
//! filters and pagination. Also resolves character offsets and segment
//! indexes back to segments, and locates episode audio.
//!
//! ```no_run
//! use explore_query::{SearchEngine, SearchRequest};
//! use explore_core::SearchMode;
//! use explore_store::StoreConfig;
//!
//! let engine = SearchEngine::open("explore.sqlite", StoreConfig::default())?;
//! let result = engine.search(&SearchRequest::new("שלום עולם", SearchMode::Exact))?;
//! for hit in &result.hits {
//!     println!("{} {:.1}s {}", hit.episode, hit.start_time, hit.segment_text);
//! }
//! # Ok::<(), explore_query::QueryError>(())
//! ```

pub mod audio;
pub mod engine;
pub mod error;
pub mod plan;
pub mod position;
pub mod resolver;
pub mod results;

pub use audio::{AudioLocator, DirectoryAudioLocator};
pub use engine::SearchEngine;
pub use error::QueryError;
pub use plan::{Narrowing, QueryPlan};
pub use position::classify_position;
pub use resolver::SegmentLocator;
pub use results::{
    DateRange, EpisodeHits, Hit, Match, SearchMetadata, SearchOptions, SearchRequest, SearchResult,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
