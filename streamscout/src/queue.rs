//! Bounded job queues.
//!
//! The pending-job queue has a single [`JobSender`] owned by the dispatcher
//! and any number of [`JobReceiver`] clones, one per worker. Consuming the
//! sender with [`JobSender::close`] closes the queue; receivers keep draining
//! what is left and then see `None`.
//!
//! The completed queue collects finished jobs for aggregation. It is sized to
//! the job count so pushing a finished job never blocks a worker.
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

use crate::job::Job;
use crate::tracker::CompletionGuard;

/// A job on its way to a worker together with its completion guard
#[derive(Debug)]
pub struct Dispatched {
    pub job: Job,
    pub guard: CompletionGuard,
}

/// Statistics for the pending-job queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Jobs enqueued by the dispatcher
    pub enqueued: AtomicU64,

    /// Jobs taken by workers
    pub dequeued: AtomicU64,

    /// Enqueue attempts that found the queue full
    pub full_events: AtomicU64,
}

impl QueueStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn dequeued(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    pub fn full_events(&self) -> u64 {
        self.full_events.load(Ordering::Relaxed)
    }
}

/// Creates a pending-job queue holding at most `capacity` jobs
pub fn job_queue(capacity: usize) -> (JobSender, JobReceiver) {
    let capacity = capacity.max(1);
    let (sender, receiver) = bounded(capacity);
    let stats = Arc::new(QueueStats::default());
    (
        JobSender {
            sender,
            capacity,
            stats: Arc::clone(&stats),
        },
        JobReceiver { receiver, stats },
    )
}

/// Producer side of the pending-job queue. Not `Clone`: there is exactly one
/// dispatcher and the queue closes exactly once, when it is consumed.
#[derive(Debug)]
pub struct JobSender {
    sender: Sender<Dispatched>,
    capacity: usize,
    stats: Arc<QueueStats>,
}

impl JobSender {
    /// Enqueues a job, blocking while the queue is full.
    ///
    /// Returns the job back if every receiver is gone.
    pub fn send(&self, item: Dispatched) -> Result<(), Dispatched> {
        let item = match self.sender.try_send(item) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            Err(TrySendError::Disconnected(item)) => return Err(item),
            Err(TrySendError::Full(item)) => {
                self.stats.full_events.fetch_add(1, Ordering::Relaxed);
                trace!("Job queue full, waiting for a worker");
                item
            }
        };

        self.sender.send(item).map_err(|e| e.into_inner())?;
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    /// Closes the queue; workers exit once it is drained
    pub fn close(self) {
        trace!(
            "Closing job queue after {} jobs",
            self.stats.enqueued.load(Ordering::Relaxed)
        );
    }
}

/// Consumer side of the pending-job queue, cloned once per worker
#[derive(Debug, Clone)]
pub struct JobReceiver {
    receiver: Receiver<Dispatched>,
    stats: Arc<QueueStats>,
}

impl JobReceiver {
    /// Waits for the next job. `None` means the queue is closed and empty.
    pub fn recv(&self) -> Option<Dispatched> {
        let item = self.receiver.recv().ok()?;
        self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        Some(item)
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// Creates the queue finished jobs are collected in
pub fn completed_queue(capacity: usize) -> (CompletedSender, CompletedReceiver) {
    let (sender, receiver) = bounded(capacity.max(1));
    (CompletedSender { sender }, CompletedReceiver { receiver })
}

/// Worker side of the completed queue
#[derive(Debug, Clone)]
pub struct CompletedSender {
    sender: Sender<Job>,
}

impl CompletedSender {
    /// Hands a finished job to the orchestrator
    pub fn push(&self, job: Job) {
        let id = job.id;
        let job = match self.sender.try_send(job) {
            Ok(()) => return,
            Err(TrySendError::Full(job)) => job,
            Err(TrySendError::Disconnected(_)) => {
                warn!("Completed queue closed, dropping job {}", id);
                return;
            }
        };
        // Only reachable if the queue was sized below the job count
        if self.sender.send(job).is_err() {
            warn!("Completed queue closed, dropping job {}", id);
        }
    }
}

/// Orchestrator side of the completed queue
#[derive(Debug)]
pub struct CompletedReceiver {
    receiver: Receiver<Job>,
}

impl CompletedReceiver {
    /// Takes up to `count` finished jobs without blocking
    pub fn drain(&self, count: usize) -> Vec<Job> {
        let mut jobs = Vec::with_capacity(count);
        while jobs.len() < count {
            match self.receiver.try_recv() {
                Ok(job) => jobs.push(job),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        jobs
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::CompletionTracker;
    use std::thread;

    fn dispatched(tracker: &CompletionTracker, id: u64) -> Dispatched {
        Dispatched {
            job: Job::new(id, id * 10, id * 10 + 9),
            guard: tracker.issue().unwrap(),
        }
    }

    #[test]
    fn test_close_drains_then_ends() {
        let tracker = CompletionTracker::new(3);
        let (sender, receiver) = job_queue(4);
        for id in 0..3 {
            sender.send(dispatched(&tracker, id)).unwrap();
        }
        sender.close();

        let ids: Vec<u64> = std::iter::from_fn(|| receiver.recv())
            .map(|d| d.job.id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(receiver.recv().is_none());
        assert_eq!(tracker.remaining(), 0);
    }

    #[test]
    fn test_small_queue_with_concurrent_consumers() {
        let tracker = CompletionTracker::new(100);
        let (sender, receiver) = job_queue(2);
        let stats = sender.stats();

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let receiver = receiver.clone();
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(item) = receiver.recv() {
                        seen.push(item.job.id);
                    }
                    seen
                })
            })
            .collect();
        drop(receiver);

        for id in 0..100 {
            sender.send(dispatched(&tracker, id)).unwrap();
        }
        sender.close();

        let mut all: Vec<u64> = consumers
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
        assert_eq!(stats.enqueued(), 100);
        assert_eq!(stats.dequeued(), 100);
        tracker.wait();
    }

    #[test]
    fn test_send_without_receivers_returns_item() {
        let tracker = CompletionTracker::new(1);
        let (sender, receiver) = job_queue(1);
        drop(receiver);
        let item = sender.send(dispatched(&tracker, 0)).unwrap_err();
        assert_eq!(item.job.id, 0);
    }

    #[test]
    fn test_completed_drain_stops_at_count() {
        let (sender, receiver) = completed_queue(5);
        for id in 0..5 {
            sender.push(Job::new(id, 0, 0));
        }
        assert_eq!(receiver.len(), 5);
        assert_eq!(receiver.drain(3).len(), 3);
        assert_eq!(receiver.drain(10).len(), 2);
        assert!(receiver.is_empty());
    }
}
