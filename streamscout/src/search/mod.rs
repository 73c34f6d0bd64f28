//! Chunked search: the orchestrator, its workers and the term matcher.
//!
//! ```text
//!   StreamSearcher ──► job queue ──► worker pool ──► search vs. deadline
//!         ▲                                                 │
//!         └──── completed queue ◄── tracker count-down ◄────┘
//! ```
pub mod engine;
pub mod matcher;
pub(crate) mod worker;

pub use engine::StreamSearcher;
pub use matcher::TermMatcher;

use crate::config::SearchConfig;
use crate::errors::SearchResult;
use crate::results::SearchSummary;

/// Opens the configured input and searches it with no per-job reporting
pub fn search(config: &SearchConfig) -> SearchResult<SearchSummary> {
    StreamSearcher::new(config)?.search()
}
