//! Where per-job status lines and the final throughput line go.
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

use crate::job::Job;
use crate::results::SearchSummary;

/// Receives job outcomes as workers finish them, then the run summary.
///
/// Called concurrently from every worker thread.
pub trait Reporter: Send + Sync {
    fn job_completed(&self, job: &Job);

    fn search_finished(&self, _summary: &SearchSummary) {}
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn job_completed(&self, _job: &Job) {}
}

/// Writes one plain line per job and the rate line to a writer
#[derive(Debug)]
pub struct LineReporter<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> LineReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_line(&self, line: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{}", line) {
            warn!("Failed to write report line: {}", e);
        }
    }
}

impl<W: Write + Send> Reporter for LineReporter<W> {
    fn job_completed(&self, job: &Job) {
        self.write_line(&job.to_string());
    }

    fn search_finished(&self, summary: &SearchSummary) {
        self.write_line(&summary.rate_line());
    }
}
