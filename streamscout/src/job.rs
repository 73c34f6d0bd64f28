//! Units of work and the plan that produces them.
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// Lifecycle of a job. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Success,
    Timeout,
    Failure,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Timeout => "TIMEOUT",
            JobStatus::Failure => "FAILURE",
        };
        f.write_str(s)
    }
}

/// Where the term was found in a chunk.
///
/// `NotFound` is a successful outcome, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOffset {
    /// No result recorded (pending, timed out or failed jobs)
    #[default]
    None,
    NotFound,
    /// Offset relative to the chunk start
    At(u64),
}

impl MatchOffset {
    /// Contribution to the aggregated byte total
    pub fn as_bytes(self) -> u64 {
        match self {
            MatchOffset::At(offset) => offset,
            MatchOffset::None | MatchOffset::NotFound => 0,
        }
    }
}

impl fmt::Display for MatchOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchOffset::None => f.write_str("0"),
            MatchOffset::NotFound => f.write_str("-1"),
            MatchOffset::At(offset) => write!(f, "{}", offset),
        }
    }
}

/// One chunk of the input and, once processed, its outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    /// Chunk index; also the ordering key
    pub id: u64,
    /// First byte of the chunk
    pub start_byte: u64,
    /// Last byte of the chunk, inclusive
    pub end_byte: u64,
    pub status: JobStatus,
    /// Match position inside the chunk (only meaningful on success)
    pub bytes_read: MatchOffset,
    /// Bytes actually read for the chunk (only meaningful on success)
    pub scanned: u64,
    /// Seconds spent reading and searching (only meaningful on success)
    pub elapsed: f64,
}

impl Job {
    pub fn new(id: u64, start_byte: u64, end_byte: u64) -> Self {
        Self {
            id,
            start_byte,
            end_byte,
            status: JobStatus::Pending,
            bytes_read: MatchOffset::None,
            scanned: 0,
            elapsed: 0.0,
        }
    }

    /// Number of bytes the chunk covers
    pub fn chunk_len(&self) -> u64 {
        self.end_byte - self.start_byte + 1
    }

    /// Records a successful search
    pub fn succeed(&mut self, output: &JobOutput) {
        debug_assert_eq!(self.status, JobStatus::Pending);
        self.status = JobStatus::Success;
        self.bytes_read = output.bytes_read;
        self.scanned = output.scanned;
        self.elapsed = output.elapsed;
    }

    /// Records a timeout or failure; result fields are zeroed
    pub fn fail_with(&mut self, status: JobStatus) {
        debug_assert_eq!(self.status, JobStatus::Pending);
        debug_assert!(matches!(status, JobStatus::Timeout | JobStatus::Failure));
        self.status = status;
        self.bytes_read = MatchOffset::None;
        self.scanned = 0;
        self.elapsed = 0.0;
    }
}

impl fmt::Display for Job {
    /// Elapsed time and match offset are only shown for successful jobs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status != JobStatus::Success {
            return write!(f, "job {:>4}    {}", self.id, self.status);
        }
        write!(
            f,
            "job {:>4} {:.6}s {} {}",
            self.id, self.elapsed, self.bytes_read, self.status
        )
    }
}

/// Result of one search activity, handed back to the owning worker
#[derive(Debug)]
pub struct JobOutput {
    pub id: u64,
    pub error: Option<std::io::Error>,
    pub bytes_read: MatchOffset,
    pub scanned: u64,
    pub elapsed: f64,
    /// When the search finished; compared against the job deadline
    pub finished_at: Instant,
}

impl JobOutput {
    pub fn failed(id: u64, error: std::io::Error) -> Self {
        Self {
            id,
            error: Some(error),
            bytes_read: MatchOffset::None,
            scanned: 0,
            elapsed: 0.0,
            finished_at: Instant::now(),
        }
    }
}

/// How the input is cut into jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkPlan {
    pub file_size: u64,
    pub chunk_size: u64,
    /// Number of full chunks
    pub full_chunks: u64,
    /// Bytes left over after the full chunks
    pub tail: u64,
    /// Whether the tail is scheduled as a short final job
    pub include_tail: bool,
}

impl ChunkPlan {
    /// Plans chunks for `file_size` bytes.
    ///
    /// With no explicit `chunk_size` it is derived as `file_size / workers`,
    /// never less than one byte.
    pub fn new(file_size: u64, workers: usize, chunk_size: Option<u64>, include_tail: bool) -> Self {
        let chunk_size = chunk_size
            .filter(|&c| c > 0)
            .unwrap_or_else(|| file_size / workers.max(1) as u64)
            .max(1);
        Self {
            file_size,
            chunk_size,
            full_chunks: file_size / chunk_size,
            tail: file_size % chunk_size,
            include_tail,
        }
    }

    /// Number of jobs the plan dispatches
    pub fn job_count(&self) -> u64 {
        self.full_chunks + u64::from(self.include_tail && self.tail > 0)
    }

    /// Bytes covered by dispatched jobs
    pub fn scheduled_bytes(&self) -> u64 {
        if self.include_tail {
            self.file_size
        } else {
            self.full_chunks * self.chunk_size
        }
    }

    /// Jobs in ascending id and byte order
    pub fn jobs(&self) -> impl Iterator<Item = Job> + '_ {
        (0..self.job_count()).map(move |id| {
            let start = id * self.chunk_size;
            let end = (start + self.chunk_size).min(self.file_size) - 1;
            Job::new(id, start, end)
        })
    }
}
