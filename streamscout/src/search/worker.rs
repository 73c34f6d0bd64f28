//! Worker loop and the per-job timeout race.
//!
//! For every job a worker launches the search on its own thread and waits on
//! a single-slot result channel until the job deadline. Whichever comes first
//! decides the job:
//!
//! ```text
//!   Pending ──► Running ──┬── result before deadline, no error ──► Success
//!                         ├── result before deadline, I/O error ─► Failure
//!                         └── deadline first (or late result) ───► Timeout
//! ```
//!
//! A timed-out search is told to stop through a cancel flag it checks between
//! read blocks. Its late result, if any, lands in a channel nobody reads. Each
//! worker keeps at most one such abandoned search alive and joins it before
//! starting the next one, so background work stays bounded by the pool size.
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::matcher::TermMatcher;
use crate::input::Input;
use crate::job::{Job, JobOutput, JobStatus, MatchOffset};
use crate::metrics::SearchMetrics;
use crate::queue::{CompletedSender, Dispatched, JobReceiver};
use crate::report::Reporter;

/// Reads are issued in blocks of this size so cancellation is noticed quickly
const READ_BLOCK: usize = 64 * 1024;

/// State shared by every worker of one run
pub(crate) struct WorkerContext {
    pub input: Arc<dyn Input>,
    pub matcher: TermMatcher,
    pub timeout: Duration,
    pub metrics: SearchMetrics,
    pub reporter: Arc<dyn Reporter>,
    pub completed: CompletedSender,
}

pub(crate) struct Worker {
    id: usize,
    jobs: JobReceiver,
    ctx: Arc<WorkerContext>,
    abandoned: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new(id: usize, jobs: JobReceiver, ctx: Arc<WorkerContext>) -> Self {
        Self {
            id,
            jobs,
            ctx,
            abandoned: None,
        }
    }

    /// Processes jobs until the queue is closed and drained.
    /// Returns the number of jobs handled.
    pub fn run(mut self) -> u64 {
        let mut processed = 0;

        while let Some(Dispatched { mut job, guard }) = self.jobs.recv() {
            self.process(&mut job);

            self.ctx.metrics.record_outcome(job.status, job.scanned);
            debug!("Worker {}: {}", self.id, job);
            self.ctx.reporter.job_completed(&job);
            self.ctx.completed.push(job);
            drop(guard);

            processed += 1;
        }

        self.reap_abandoned();
        debug!("Worker {} exiting after {} jobs", self.id, processed);
        processed
    }

    /// Runs the search-versus-deadline race and records the winner on `job`
    fn process(&mut self, job: &mut Job) {
        self.reap_abandoned();

        let started = Instant::now();
        // A deadline too far out to represent means no deadline
        let deadline = started.checked_add(self.ctx.timeout);
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = bounded(1);

        let handle = match self.spawn_search(job, Arc::clone(&cancel), tx) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Job {}: could not start search: {}", job.id, e);
                job.fail_with(JobStatus::Failure);
                return;
            }
        };

        let received = match deadline {
            Some(deadline) => rx.recv_deadline(deadline),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(output) if deadline.map_or(true, |d| output.finished_at < d) => {
                if let Some(e) = &output.error {
                    warn!("Job {} failed: {}", job.id, e);
                    job.fail_with(JobStatus::Failure);
                } else {
                    job.succeed(&output);
                }
                join_search(job.id, handle);
            }
            Ok(_) => {
                // Finished, but only after the deadline had already passed
                debug!("Job {} finished late, discarding result", job.id);
                job.fail_with(JobStatus::Timeout);
                join_search(job.id, handle);
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Job {} timed out after {}",
                    job.id,
                    humantime::format_duration(self.ctx.timeout)
                );
                cancel.store(true, Ordering::Release);
                job.fail_with(JobStatus::Timeout);
                self.ctx.metrics.record_abandoned();
                self.abandoned = Some(handle);
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Job {}: search ended without a result", job.id);
                job.fail_with(JobStatus::Failure);
                join_search(job.id, handle);
            }
        }
    }

    fn spawn_search(
        &self,
        job: &Job,
        cancel: Arc<AtomicBool>,
        tx: Sender<JobOutput>,
    ) -> io::Result<JoinHandle<()>> {
        let input = Arc::clone(&self.ctx.input);
        let matcher = self.ctx.matcher.clone();
        let (id, start, len) = (job.id, job.start_byte, job.chunk_len());

        thread::Builder::new()
            .name(format!("scout-search-{}", id))
            .spawn(move || {
                if let Some(output) = search_chunk(input.as_ref(), &matcher, id, start, len, &cancel) {
                    // The worker may have stopped listening; the slot just drops
                    let _ = tx.try_send(output);
                }
            })
    }

    /// Waits for the previous abandoned search, if any, to stop
    fn reap_abandoned(&mut self) {
        if let Some(handle) = self.abandoned.take() {
            trace!("Worker {} waiting for abandoned search", self.id);
            if handle.join().is_err() {
                warn!("Worker {}: abandoned search panicked", self.id);
            }
            self.ctx.metrics.record_abandoned_finished();
        }
    }
}

fn join_search(id: u64, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        warn!("Job {}: search thread panicked", id);
    }
}

/// Reads `len` bytes at `start` and looks for the term.
///
/// A short read at end of input is not an error. Returns `None` if
/// cancelled before finishing.
pub(crate) fn search_chunk(
    input: &dyn Input,
    matcher: &TermMatcher,
    id: u64,
    start: u64,
    len: u64,
    cancel: &AtomicBool,
) -> Option<JobOutput> {
    let begin = Instant::now();

    let len = match usize::try_from(len) {
        Ok(len) => len,
        Err(_) => {
            return Some(JobOutput::failed(
                id,
                io::Error::new(io::ErrorKind::InvalidInput, "chunk does not fit in memory"),
            ))
        }
    };

    let mut buffer = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        if cancel.load(Ordering::Acquire) {
            trace!("Job {} cancelled after reading {} bytes", id, filled);
            return None;
        }
        let end = (filled + READ_BLOCK).min(len);
        match input.read_at(start + filled as u64, &mut buffer[filled..end]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Some(JobOutput::failed(id, e)),
        }
    }

    if cancel.load(Ordering::Acquire) {
        return None;
    }

    let bytes_read = match matcher.find(&buffer[..filled]) {
        Some(offset) => MatchOffset::At(offset as u64),
        None => MatchOffset::NotFound,
    };
    let finished_at = Instant::now();
    trace!("Job {} searched {} bytes: {}", id, filled, bytes_read);

    Some(JobOutput {
        id,
        error: None,
        bytes_read,
        scanned: filled as u64,
        elapsed: finished_at.duration_since(begin).as_secs_f64(),
        finished_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::MemoryInput;
    use crate::queue::{completed_queue, job_queue};
    use crate::report::NullReporter;
    use crate::tracker::CompletionTracker;

    struct BrokenInput;

    impl Input for BrokenInput {
        fn size(&self) -> u64 {
            1024
        }

        fn read_at(&self, _offset: u64, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("device unplugged"))
        }
    }

    /// Serves reads slowly so a short deadline always wins
    struct SlowInput {
        inner: MemoryInput,
        delay: Duration,
    }

    impl Input for SlowInput {
        fn size(&self) -> u64 {
            self.inner.size()
        }

        fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(self.delay);
            self.inner.read_at(offset, buf)
        }
    }

    fn haystack() -> Vec<u8> {
        let mut bytes = vec![b'.'; 1000];
        bytes[700..706].copy_from_slice(b"NEEDLE");
        bytes
    }

    #[test]
    fn test_search_chunk_reports_offset_within_chunk() {
        let input = MemoryInput::new(haystack());
        let matcher = TermMatcher::literal("NEEDLE").unwrap();
        let cancel = AtomicBool::new(false);

        let output = search_chunk(&input, &matcher, 1, 500, 500, &cancel).unwrap();
        assert!(output.error.is_none());
        assert_eq!(output.bytes_read, MatchOffset::At(200));
        assert_eq!(output.scanned, 500);

        let output = search_chunk(&input, &matcher, 0, 0, 500, &cancel).unwrap();
        assert_eq!(output.bytes_read, MatchOffset::NotFound);
    }

    #[test]
    fn test_search_chunk_short_read_is_not_an_error() {
        let input = MemoryInput::new(haystack());
        let matcher = TermMatcher::literal("NEEDLE").unwrap();
        let cancel = AtomicBool::new(false);

        let output = search_chunk(&input, &matcher, 0, 600, 4096, &cancel).unwrap();
        assert!(output.error.is_none());
        assert_eq!(output.scanned, 400);
        assert_eq!(output.bytes_read, MatchOffset::At(100));
    }

    #[test]
    fn test_search_chunk_io_error() {
        let matcher = TermMatcher::literal("x").unwrap();
        let cancel = AtomicBool::new(false);
        let output = search_chunk(&BrokenInput, &matcher, 3, 0, 10, &cancel).unwrap();
        assert_eq!(output.id, 3);
        assert!(output.error.is_some());
    }

    #[test]
    fn test_search_chunk_cancelled() {
        let input = MemoryInput::new(haystack());
        let matcher = TermMatcher::literal("NEEDLE").unwrap();
        let cancel = AtomicBool::new(true);
        assert!(search_chunk(&input, &matcher, 0, 0, 1000, &cancel).is_none());
    }

    fn run_single_worker(input: Arc<dyn Input>, timeout: Duration, chunks: &[(u64, u64)]) -> Vec<Job> {
        let tracker = CompletionTracker::new(chunks.len() as u64);
        let (job_tx, job_rx) = job_queue(chunks.len());
        let (done_tx, done_rx) = completed_queue(chunks.len());
        let ctx = Arc::new(WorkerContext {
            input,
            matcher: TermMatcher::literal("NEEDLE").unwrap(),
            timeout,
            metrics: SearchMetrics::new(),
            reporter: Arc::new(NullReporter),
            completed: done_tx,
        });

        for (id, &(start, end)) in chunks.iter().enumerate() {
            let guard = tracker.issue().unwrap();
            job_tx
                .send(Dispatched {
                    job: Job::new(id as u64, start, end),
                    guard,
                })
                .unwrap();
        }
        job_tx.close();

        let processed = Worker::new(0, job_rx, Arc::clone(&ctx)).run();
        assert_eq!(processed, chunks.len() as u64);
        tracker.wait();

        let mut jobs = done_rx.drain(chunks.len());
        jobs.sort_by_key(|job| job.id);
        assert_eq!(ctx.metrics.get_stats().abandoned_in_flight, 0);
        jobs
    }

    #[test]
    fn test_worker_success_and_not_found() {
        let input: Arc<dyn Input> = Arc::new(MemoryInput::new(haystack()));
        let jobs = run_single_worker(input, Duration::from_secs(5), &[(0, 499), (500, 999)]);

        assert_eq!(jobs[0].status, JobStatus::Success);
        assert_eq!(jobs[0].bytes_read, MatchOffset::NotFound);
        assert_eq!(jobs[1].status, JobStatus::Success);
        assert_eq!(jobs[1].bytes_read, MatchOffset::At(200));
        assert!(jobs[1].elapsed >= 0.0);
    }

    #[test]
    fn test_worker_zero_timeout_always_times_out() {
        let input: Arc<dyn Input> = Arc::new(MemoryInput::new(haystack()));
        let jobs = run_single_worker(input, Duration::ZERO, &[(0, 499), (500, 999)]);

        for job in &jobs {
            assert_eq!(job.status, JobStatus::Timeout);
            assert_eq!(job.bytes_read, MatchOffset::None);
            assert_eq!(job.elapsed, 0.0);
        }
    }

    #[test]
    fn test_worker_slow_read_times_out_and_continues() {
        let input: Arc<dyn Input> = Arc::new(SlowInput {
            inner: MemoryInput::new(haystack()),
            delay: Duration::from_millis(200),
        });
        let jobs = run_single_worker(input, Duration::from_millis(20), &[(0, 499), (500, 999)]);

        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|job| job.status == JobStatus::Timeout));
    }

    #[test]
    fn test_worker_io_error_is_failure() {
        let jobs = run_single_worker(Arc::new(BrokenInput), Duration::from_secs(5), &[(0, 9), (10, 19)]);

        for job in &jobs {
            assert_eq!(job.status, JobStatus::Failure);
            assert_eq!(job.elapsed, 0.0);
        }
    }
}
