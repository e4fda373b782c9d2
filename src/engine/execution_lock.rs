//! Keyed, timeout-bounded execution locks.
//!
//! One binary semaphore per job id, created lazily on first use, guarantees
//! at-most-one concurrent execution of a given persisted job - across
//! scheduler ticks, async submissions and manual replays alike. Acquisition
//! waits a bounded time and then gives up; the caller skips the run (it is
//! never queued). Locks are keyed by job id, so jobs that happen to share a
//! name still get independent locks.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Registry of per-job execution locks.
pub struct JobExecutionLock {
    locks: DashMap<String, Arc<Semaphore>>,
    timeout: Duration,
}

/// Exclusive hold on one job's execution slot.
///
/// The slot is released when the guard is dropped, including on panic and
/// on every early-return path of the run body.
pub struct JobExecutionGuard {
    _permit: OwnedSemaphorePermit,
}

impl JobExecutionLock {
    /// Creates a lock registry whose acquisitions give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    /// Acquires the execution slot for a job, waiting up to the configured
    /// timeout.
    ///
    /// Returns `None` when the slot is still held when the wait expires;
    /// the caller must skip the run and log, never block further.
    pub async fn acquire(&self, job_id: &str) -> Option<JobExecutionGuard> {
        let semaphore = self
            .locks
            .entry(job_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone();

        match tokio::time::timeout(self.timeout, semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => Some(JobExecutionGuard { _permit: permit }),
            // Elapsed, or semaphore closed (never closed in practice).
            _ => None,
        }
    }

    /// Returns true while some holder has the job's execution slot.
    pub fn is_locked(&self, job_id: &str) -> bool {
        self.locks
            .get(job_id)
            .map(|s| s.available_permits() == 0)
            .unwrap_or(false)
    }
}
