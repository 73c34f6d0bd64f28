pub mod config;
pub mod errors;
pub mod input;
pub mod job;
pub mod metrics;
pub mod queue;
pub mod report;
pub mod results;
pub mod search;
pub mod tracker;

pub use config::{CliOverrides, SearchConfig};
pub use errors::{SearchError, SearchResult};
pub use input::{FileInput, Input, MemoryInput, MmapInput};
pub use job::{ChunkPlan, Job, JobStatus, MatchOffset};
pub use report::{LineReporter, NullReporter, Reporter};
pub use results::SearchSummary;
pub use search::{search, StreamSearcher};
