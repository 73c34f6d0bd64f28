use std::num::{NonZeroU64, NonZeroUsize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::matcher::TermMatcher;
use super::worker::{Worker, WorkerContext};
use crate::config::SearchConfig;
use crate::errors::{SearchError, SearchResult};
use crate::input::{open_input, Input};
use crate::job::{ChunkPlan, Job, JobStatus};
use crate::metrics::SearchMetrics;
use crate::queue::{completed_queue, job_queue, Dispatched, JobSender};
use crate::report::{NullReporter, Reporter};
use crate::results::SearchSummary;
use crate::tracker::CompletionTracker;

/// How often the orchestrator checks that the pool is still alive while
/// waiting for completions
const POOL_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Searches one input for one term with a fixed-size worker pool.
///
/// Construction does all the fallible setup (opening and sizing the input,
/// compiling the term); a failure there is the only error a caller sees.
/// Problems with individual chunks end up in the job statuses instead.
pub struct StreamSearcher {
    input: Arc<dyn Input>,
    matcher: TermMatcher,
    plan: ChunkPlan,
    worker_count: NonZeroUsize,
    timeout: Duration,
    queue_capacity: Option<NonZeroUsize>,
}

impl StreamSearcher {
    /// Opens the configured file and plans the chunks
    pub fn new(config: &SearchConfig) -> SearchResult<Self> {
        config.validate()?;
        let input = open_input(&config.file_path, config.use_mmap)?;
        Self::with_input(config, input)
    }

    /// Plans a search over an already-open input; `config.file_path` is ignored
    pub fn with_input(config: &SearchConfig, input: Arc<dyn Input>) -> SearchResult<Self> {
        let matcher = TermMatcher::new(&config.search_term, config.is_regex)?;
        let plan = ChunkPlan::new(
            input.size(),
            config.worker_count.get(),
            config.chunk_size.map(NonZeroU64::get),
            config.include_tail,
        );
        usize::try_from(plan.job_count())
            .map_err(|_| SearchError::config_error("chunk size too small for this input"))?;

        debug!(
            "Planned {} jobs of {} bytes over {} bytes ({} tail bytes {})",
            plan.job_count(),
            plan.chunk_size,
            plan.file_size,
            plan.tail,
            if plan.include_tail { "scheduled" } else { "skipped" }
        );

        Ok(Self {
            input,
            matcher,
            plan,
            worker_count: config.worker_count,
            timeout: config.timeout(),
            queue_capacity: config.queue_capacity,
        })
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    /// Runs the search to completion without reporting individual jobs
    pub fn search(&self) -> SearchResult<SearchSummary> {
        self.search_with(Arc::new(NullReporter))
    }

    /// Runs the search to completion, reporting each job as it finishes.
    ///
    /// Blocks until every dispatched job has reached a terminal status and
    /// every worker has exited.
    pub fn search_with(&self, reporter: Arc<dyn Reporter>) -> SearchResult<SearchSummary> {
        let started = Instant::now();
        let job_count = self.plan.job_count();
        let slots = job_count as usize;
        let capacity = self.queue_capacity.map_or(slots, NonZeroUsize::get);

        info!(
            "Starting search: {} jobs, {} workers, {} timeout",
            job_count,
            self.worker_count,
            humantime::format_duration(self.timeout)
        );

        let tracker = CompletionTracker::new(job_count);
        let metrics = SearchMetrics::new();
        let (job_tx, job_rx) = job_queue(capacity);
        let (done_tx, done_rx) = completed_queue(slots);

        let ctx = Arc::new(WorkerContext {
            input: Arc::clone(&self.input),
            matcher: self.matcher.clone(),
            timeout: self.timeout,
            metrics: metrics.clone(),
            reporter: Arc::clone(&reporter),
            completed: done_tx,
        });

        let mut workers = Vec::with_capacity(self.worker_count.get());
        for id in 0..self.worker_count.get() {
            let worker = Worker::new(id, job_rx.clone(), Arc::clone(&ctx));
            let spawned = thread::Builder::new()
                .name(format!("scout-worker-{}", id))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Closing the queue lets the workers already running exit
                    job_tx.close();
                    join_workers(workers);
                    return Err(SearchError::SpawnError(e));
                }
            }
        }
        drop(job_rx);
        drop(ctx);

        let dispatcher = {
            let plan = self.plan;
            let tracker = tracker.clone();
            let metrics = metrics.clone();
            thread::Builder::new()
                .name("scout-dispatcher".to_string())
                .spawn(move || dispatch(plan, &tracker, &metrics, job_tx))
        };
        let dispatcher = match dispatcher {
            Ok(handle) => handle,
            Err(e) => {
                // The sender went down with the closure, so the queue is closed
                join_workers(workers);
                return Err(SearchError::SpawnError(e));
            }
        };

        while !tracker.wait_timeout(POOL_CHECK_INTERVAL) {
            if workers.iter().all(JoinHandle::is_finished) {
                error!(
                    "All workers exited with {} jobs outstanding",
                    tracker.remaining()
                );
                break;
            }
        }

        match dispatcher.join() {
            Ok(sent) => debug!("Dispatcher enqueued {} jobs", sent),
            Err(_) => error!("Dispatcher thread panicked"),
        }
        join_workers(workers);

        let mut jobs = done_rx.drain(slots);
        if jobs.len() < slots {
            warn!(
                "Only {} of {} jobs reported back; marking the rest as failed",
                jobs.len(),
                slots
            );
            fill_missing(&self.plan, &mut jobs);
        }

        metrics.log_stats();
        let summary = SearchSummary::from_jobs(self.plan, jobs, started.elapsed(), metrics.get_stats());
        reporter.search_finished(&summary);

        info!(
            "Search complete in {}: {} succeeded, {} timed out, {} failed, {} bytes/s",
            humantime::format_duration(summary.wall_time),
            summary.succeeded,
            summary.timed_out,
            summary.failed,
            summary.rate
        );

        Ok(summary)
    }
}

/// Enqueues every planned job, then closes the queue
fn dispatch(
    plan: ChunkPlan,
    tracker: &CompletionTracker,
    metrics: &SearchMetrics,
    sender: JobSender,
) -> u64 {
    let mut sent = 0;
    for job in plan.jobs() {
        let Some(guard) = tracker.issue() else {
            error!("Job {} has no completion slot", job.id);
            break;
        };
        metrics.record_dispatch();
        if let Err(item) = sender.send(Dispatched { job, guard }) {
            warn!("No workers left to take job {}", item.job.id);
            break;
        }
        sent += 1;
    }
    let stats = sender.stats();
    debug!(
        "Queue (capacity {}): {} enqueued, {} taken, {} waits on a full queue",
        sender.capacity(),
        stats.enqueued(),
        stats.dequeued(),
        stats.full_events()
    );
    sender.close();
    sent
}

fn join_workers(workers: Vec<JoinHandle<u64>>) {
    for (id, handle) in workers.into_iter().enumerate() {
        match handle.join() {
            Ok(processed) => debug!("Worker {} joined after {} jobs", id, processed),
            Err(_) => error!("Worker {} panicked", id),
        }
    }
}

/// Adds a failed record for every planned job that never came back
fn fill_missing(plan: &ChunkPlan, jobs: &mut Vec<Job>) {
    let mut seen = vec![false; plan.job_count() as usize];
    for job in jobs.iter() {
        if let Some(slot) = seen.get_mut(job.id as usize) {
            *slot = true;
        }
    }
    for mut job in plan.jobs() {
        if !seen[job.id as usize] {
            job.fail_with(JobStatus::Failure);
            jobs.push(job);
        }
    }
}
