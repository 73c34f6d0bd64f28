use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::{NonZeroU64, NonZeroUsize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{SearchError, SearchResult};
use crate::search::matcher::TermMatcher;

/// Configuration for a chunked search.
///
/// # Configuration Locations
///
/// Values are layered in order of increasing precedence:
/// 1. Global `$CONFIG_DIR/streamscout/config.yaml`
/// 2. Local `.streamscout.yaml` in the current directory
/// 3. Custom config file passed via `--config`
///
/// Command-line flags are applied last through [`SearchConfig::merge_with_cli`].
///
/// # Configuration Format
///
/// ```yaml
/// # File to search
/// file_path: "./_input.txt"
///
/// # Byte sequence to look for in every chunk
/// search_term: "Leapfn"
///
/// # Size of the worker pool (default: CPU cores)
/// worker_count: 10
///
/// # Per-chunk deadline in milliseconds
/// timeout_ms: 1000
///
/// # Chunk size in bytes; omit to use file_size / worker_count
/// chunk_size: 65536
///
/// # Also schedule the short trailing chunk
/// include_tail: false
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// File to search
    #[serde(default = "default_file_path")]
    pub file_path: PathBuf,

    /// Term searched for inside each chunk
    #[serde(default)]
    pub search_term: String,

    /// Treat the term as a regular expression instead of literal bytes
    #[serde(default)]
    pub is_regex: bool,

    /// Number of workers in the pool
    #[serde(default = "default_worker_count")]
    pub worker_count: NonZeroUsize,

    /// Deadline for a single chunk's read and search, in milliseconds.
    /// Zero makes every job time out.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Bytes per chunk. `None` derives `file_size / worker_count`.
    #[serde(default)]
    pub chunk_size: Option<NonZeroU64>,

    /// Capacity of the pending-job queue. `None` sizes it to the job count.
    #[serde(default)]
    pub queue_capacity: Option<NonZeroUsize>,

    /// Schedule the trailing partial chunk as a final short job
    #[serde(default)]
    pub include_tail: bool,

    /// Read the input through a memory map instead of positioned reads
    #[serde(default)]
    pub use_mmap: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_file_path() -> PathBuf {
    PathBuf::from("./_input.txt")
}

fn default_worker_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            file_path: default_file_path(),
            search_term: String::new(),
            is_regex: false,
            worker_count: default_worker_count(),
            timeout_ms: default_timeout_ms(),
            chunk_size: None,
            queue_capacity: None,
            include_tail: false,
            use_mmap: false,
            log_level: default_log_level(),
        }
    }
}

impl SearchConfig {
    /// Creates a configuration for `term` in `path`, everything else defaulted
    pub fn new(path: impl Into<PathBuf>, term: impl Into<String>) -> Self {
        Self {
            file_path: path.into(),
            search_term: term.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus a specific file
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("streamscout/config.yaml")),
            Some(PathBuf::from(".streamscout.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicitly requested file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(path) = cli.file_path {
            self.file_path = path;
        }
        if let Some(term) = cli.search_term {
            self.search_term = term;
        }
        if cli.is_regex {
            self.is_regex = true;
        }
        if let Some(workers) = cli.worker_count {
            self.worker_count = workers;
        }
        if let Some(timeout) = cli.timeout_ms {
            self.timeout_ms = timeout;
        }
        if cli.chunk_size.is_some() {
            self.chunk_size = cli.chunk_size;
        }
        if cli.queue_capacity.is_some() {
            self.queue_capacity = cli.queue_capacity;
        }
        if cli.include_tail {
            self.include_tail = true;
        }
        if cli.use_mmap {
            self.use_mmap = true;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// Per-job deadline
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Rejects configurations that cannot start a search
    pub fn validate(&self) -> SearchResult<()> {
        if self.search_term.is_empty() {
            return Err(SearchError::config_error("search term must not be empty"));
        }
        TermMatcher::new(&self.search_term, self.is_regex)?;
        Ok(())
    }

    /// Renders the effective configuration as YAML
    pub fn to_yaml(&self) -> SearchResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Values supplied on the command line. `None`/`false` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub file_path: Option<PathBuf>,
    pub search_term: Option<String>,
    pub is_regex: bool,
    pub worker_count: Option<NonZeroUsize>,
    pub timeout_ms: Option<u64>,
    pub chunk_size: Option<NonZeroU64>,
    pub queue_capacity: Option<NonZeroUsize>,
    pub include_tail: bool,
    pub use_mmap: bool,
    pub log_level: Option<String>,
}
