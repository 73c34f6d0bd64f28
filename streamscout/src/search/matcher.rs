use memchr::memmem::Finder;
use regex::bytes::Regex;
use std::sync::Arc;

use crate::errors::{SearchError, SearchResult};

/// Strategy for locating the term in a chunk
#[derive(Debug, Clone)]
enum MatchStrategy {
    Literal(Arc<Finder<'static>>),
    Regex(Arc<Regex>),
}

/// Finds the first occurrence of the search term in a byte buffer.
///
/// Cheap to clone; every worker holds its own handle to the same compiled
/// searcher.
#[derive(Debug, Clone)]
pub struct TermMatcher {
    strategy: MatchStrategy,
    term_len: usize,
}

impl TermMatcher {
    /// Builds a matcher for `term`, compiling it as a regex when `is_regex`
    pub fn new(term: &str, is_regex: bool) -> SearchResult<Self> {
        if term.is_empty() {
            return Err(SearchError::config_error("search term must not be empty"));
        }

        let strategy = if is_regex {
            let regex = Regex::new(term).map_err(|e| SearchError::invalid_pattern(e.to_string()))?;
            MatchStrategy::Regex(Arc::new(regex))
        } else {
            MatchStrategy::Literal(Arc::new(Finder::new(term.as_bytes()).into_owned()))
        };

        Ok(Self {
            strategy,
            term_len: term.len(),
        })
    }

    /// Literal matcher for `term`
    pub fn literal(term: &str) -> SearchResult<Self> {
        Self::new(term, false)
    }

    /// Offset of the first match in `haystack`, if any
    pub fn find(&self, haystack: &[u8]) -> Option<usize> {
        match &self.strategy {
            MatchStrategy::Literal(finder) => finder.find(haystack),
            MatchStrategy::Regex(regex) => regex.find(haystack).map(|m| m.start()),
        }
    }

    /// Length in bytes of the term as given
    pub fn term_len(&self) -> usize {
        self.term_len
    }
}
