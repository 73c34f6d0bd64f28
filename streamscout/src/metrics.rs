use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::job::JobStatus;

/// Counters shared by the orchestrator and all workers
#[derive(Debug, Clone)]
pub struct SearchMetrics {
    // Job outcome metrics
    dispatched: Arc<AtomicU64>,
    succeeded: Arc<AtomicU64>,
    timed_out: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,

    // I/O metrics
    bytes_scanned: Arc<AtomicU64>,

    // Searches abandoned after a timeout that are still running
    abandoned_in_flight: Arc<AtomicU64>,
    abandoned_peak: Arc<AtomicU64>,
}

impl SearchMetrics {
    /// Creates a new SearchMetrics instance
    pub fn new() -> Self {
        Self {
            dispatched: Arc::new(AtomicU64::new(0)),
            succeeded: Arc::new(AtomicU64::new(0)),
            timed_out: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
            bytes_scanned: Arc::new(AtomicU64::new(0)),
            abandoned_in_flight: Arc::new(AtomicU64::new(0)),
            abandoned_peak: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a job handed to the queue
    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a job's terminal status
    pub fn record_outcome(&self, status: JobStatus, scanned: u64) {
        match status {
            JobStatus::Success => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                self.bytes_scanned.fetch_add(scanned, Ordering::Relaxed);
            }
            JobStatus::Timeout => {
                self.timed_out.fetch_add(1, Ordering::Relaxed);
            }
            JobStatus::Failure => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            JobStatus::Pending => {}
        }
    }

    /// Records a search left running after its job timed out
    pub fn record_abandoned(&self) {
        let current = self.abandoned_in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        let mut peak = self.abandoned_peak.load(Ordering::Relaxed);
        while current > peak {
            match self.abandoned_peak.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => peak = actual,
            }
        }
        debug!("Abandoned search started, {} in flight", current);
    }

    /// Records an abandoned search finally stopping
    pub fn record_abandoned_finished(&self) {
        let current = self.abandoned_in_flight.fetch_sub(1, Ordering::Relaxed) - 1;
        debug!("Abandoned search stopped, {} in flight", current);
    }

    /// Gets a point-in-time copy of all counters
    pub fn get_stats(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes_scanned: self.bytes_scanned.load(Ordering::Relaxed),
            abandoned_in_flight: self.abandoned_in_flight.load(Ordering::Relaxed),
            abandoned_peak: self.abandoned_peak.load(Ordering::Relaxed),
        }
    }

    /// Logs current statistics
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Search stats:\n\
             Jobs dispatched: {}\n\
             Jobs succeeded/timed out/failed: {}/{}/{}\n\
             Bytes scanned: {}\n\
             Abandoned searches (in flight/peak): {}/{}",
            stats.dispatched,
            stats.succeeded,
            stats.timed_out,
            stats.failed,
            stats.bytes_scanned,
            stats.abandoned_in_flight,
            stats.abandoned_peak
        );
    }
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`SearchMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub dispatched: u64,
    pub succeeded: u64,
    pub timed_out: u64,
    pub failed: u64,
    pub bytes_scanned: u64,
    pub abandoned_in_flight: u64,
    pub abandoned_peak: u64,
}

impl MetricsSnapshot {
    /// Jobs that reached a terminal state
    pub fn completed(&self) -> u64 {
        self.succeeded + self.timed_out + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_tracking() {
        let metrics = SearchMetrics::new();
        for _ in 0..4 {
            metrics.record_dispatch();
        }
        metrics.record_outcome(JobStatus::Success, 1000);
        metrics.record_outcome(JobStatus::Success, 500);
        metrics.record_outcome(JobStatus::Timeout, 1000);
        metrics.record_outcome(JobStatus::Failure, 0);

        let stats = metrics.get_stats();
        assert_eq!(stats.dispatched, 4);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed(), 4);
        // Only successful jobs count as scanned
        assert_eq!(stats.bytes_scanned, 1500);
    }

    #[test]
    fn test_abandoned_peak_tracking() {
        let metrics = SearchMetrics::new();

        metrics.record_abandoned();
        metrics.record_abandoned();
        let stats = metrics.get_stats();
        assert_eq!(stats.abandoned_in_flight, 2);
        assert_eq!(stats.abandoned_peak, 2);

        metrics.record_abandoned_finished();
        metrics.record_abandoned();
        metrics.record_abandoned_finished();
        let stats = metrics.get_stats();
        assert_eq!(stats.abandoned_in_flight, 1);
        assert_eq!(stats.abandoned_peak, 2); // Peak should remain unchanged
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = SearchMetrics::default();
        let clone = metrics.clone();
        clone.record_dispatch();
        assert_eq!(metrics.get_stats().dispatched, 1);
    }
}
