//! Wait-group style completion tracking.
//!
//! The tracker is created with the number of jobs about to be dispatched and
//! hands out exactly that many [`CompletionGuard`]s. Each guard travels with
//! its job; dropping it is the only way to count a job as complete, so a job
//! can never be counted twice and a worker that unwinds still counts down.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct TrackerInner {
    total: u64,
    issued: AtomicU64,
    remaining: AtomicU64,
    lock: Mutex<()>,
    done: Condvar,
}

/// Counts outstanding jobs down to zero
#[derive(Debug, Clone)]
pub struct CompletionTracker {
    inner: Arc<TrackerInner>,
}

impl CompletionTracker {
    /// Creates a tracker expecting `total` completions
    pub fn new(total: u64) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                total,
                issued: AtomicU64::new(0),
                remaining: AtomicU64::new(total),
                lock: Mutex::new(()),
                done: Condvar::new(),
            }),
        }
    }

    /// Issues the guard for the next job, or `None` once `total` guards exist
    pub fn issue(&self) -> Option<CompletionGuard> {
        self.inner
            .issued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.inner.total).then_some(n + 1)
            })
            .ok()
            .map(|_| CompletionGuard {
                inner: Arc::clone(&self.inner),
            })
    }

    /// Jobs expected in total
    pub fn total(&self) -> u64 {
        self.inner.total
    }

    /// Jobs not yet completed
    pub fn remaining(&self) -> u64 {
        self.inner.remaining.load(Ordering::Acquire)
    }

    /// Blocks until every job has completed
    pub fn wait(&self) {
        let mut guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while self.remaining() > 0 {
            guard = self
                .inner
                .done
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks until every job has completed or `timeout` passes.
    /// Returns `true` if the count reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while self.remaining() > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = self
                .inner
                .done
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// Marks one job complete when dropped
#[derive(Debug)]
#[must_use = "dropping the guard immediately marks the job complete"]
pub struct CompletionGuard {
    inner: Arc<TrackerInner>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.inner.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Taking the lock orders this notify after a waiter's check
            let _guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.inner.done.notify_all();
        }
    }
}
