use serde::Serialize;
use std::time::Duration;

use crate::job::{ChunkPlan, Job, JobStatus, MatchOffset};
use crate::metrics::MetricsSnapshot;

/// Outcome of one complete search run
#[derive(Debug, Clone, Serialize)]
pub struct SearchSummary {
    /// How the input was cut up
    pub plan: ChunkPlan,
    /// Every dispatched job, sorted by id
    pub jobs: Vec<Job>,
    pub succeeded: u64,
    pub timed_out: u64,
    pub failed: u64,
    /// Sum of match offsets over successful jobs
    pub total_bytes: u64,
    /// Sum of read+search seconds over successful jobs
    pub total_elapsed: f64,
    /// `total_bytes / total_elapsed`, zero when nothing succeeded
    pub rate: f64,
    /// Bytes actually read by successful jobs
    pub total_scanned: u64,
    /// `total_scanned / total_elapsed`, zero when nothing succeeded
    pub scan_rate: f64,
    /// Wall-clock time of the whole run
    #[serde(serialize_with = "serialize_secs")]
    pub wall_time: Duration,
    pub metrics: MetricsSnapshot,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl SearchSummary {
    /// Folds finished jobs into aggregate statistics.
    ///
    /// Jobs may arrive in any completion order; only successful jobs
    /// contribute to the byte and time totals.
    pub fn from_jobs(
        plan: ChunkPlan,
        mut jobs: Vec<Job>,
        wall_time: Duration,
        metrics: MetricsSnapshot,
    ) -> Self {
        jobs.sort_unstable_by_key(|job| job.id);

        let mut summary = Self {
            plan,
            jobs: Vec::new(),
            succeeded: 0,
            timed_out: 0,
            failed: 0,
            total_bytes: 0,
            total_elapsed: 0.0,
            rate: 0.0,
            total_scanned: 0,
            scan_rate: 0.0,
            wall_time,
            metrics,
        };

        for job in &jobs {
            match job.status {
                JobStatus::Success => {
                    summary.succeeded += 1;
                    summary.total_bytes += job.bytes_read.as_bytes();
                    summary.total_scanned += job.scanned;
                    summary.total_elapsed += job.elapsed;
                }
                JobStatus::Timeout => summary.timed_out += 1,
                JobStatus::Failure => summary.failed += 1,
                JobStatus::Pending => {}
            }
        }

        if summary.total_elapsed != 0.0 {
            summary.rate = summary.total_bytes as f64 / summary.total_elapsed;
            summary.scan_rate = summary.total_scanned as f64 / summary.total_elapsed;
        }
        summary.jobs = jobs;
        summary
    }

    /// Jobs whose search located the term
    pub fn matches(&self) -> impl Iterator<Item = &Job> {
        self.jobs
            .iter()
            .filter(|job| matches!(job.bytes_read, MatchOffset::At(_)))
    }

    /// Absolute file offsets of every located match
    pub fn match_positions(&self) -> Vec<u64> {
        self.matches()
            .map(|job| job.start_byte + job.bytes_read.as_bytes())
            .collect()
    }

    /// Statuses indexed by job id
    pub fn statuses(&self) -> Vec<JobStatus> {
        self.jobs.iter().map(|job| job.status).collect()
    }

    /// The final throughput line
    pub fn rate_line(&self) -> String {
        format!("{} bytes/s read", self.rate)
    }
}
