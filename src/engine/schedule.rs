//! Recurring-task registry.
//!
//! One timer task per registered scheduled job, keyed by job id. Each timer
//! occupies one schedule-pool slot for its whole lifetime, so the pool's
//! capacity bounds how many recurring jobs can exist at once; when the pool
//! is exhausted, registration fails immediately instead of waiting.
//!
//! Timers fire at a fixed rate with no catch-up: ticks that would have fired
//! while a previous tick body was still running are skipped, never bursted.
//! Registering a job id that already has a timer cancels the old timer and
//! replaces it, so a schedule change takes effect by re-registering.

use super::pools::WorkerPool;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Cancellation handle for one registered timer.
struct ScheduledTaskHandle {
    cancel: CancellationToken,
}

impl Drop for ScheduledTaskHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Registry of fixed-rate recurring tasks, keyed by job id.
pub struct ScheduledTaskRegistry {
    entries: DashMap<String, ScheduledTaskHandle>,
    pool: Arc<WorkerPool>,
    initial_delay: Duration,
}

impl ScheduledTaskRegistry {
    /// Creates a registry backed by the given schedule pool.
    ///
    /// `initial_delay` is the wait before the first tick of every newly
    /// registered timer.
    pub fn new(pool: Arc<WorkerPool>, initial_delay: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            pool,
            initial_delay,
        }
    }

    /// Registers a fixed-rate timer for a job.
    ///
    /// `tick` is invoked once per period, first after the initial delay.
    /// Returns false without registering anything when the schedule pool has
    /// no free slot or the period is zero. A job id that is already
    /// registered gets its old timer cancelled and replaced.
    pub fn register<F, Fut>(&self, job_id: &str, period: Duration, tick: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        if period.is_zero() {
            error!(job_id, "refusing to register timer with zero period");
            return false;
        }

        let Some(permit) = self.pool.try_acquire() else {
            warn!(
                job_id,
                capacity = self.pool.capacity(),
                "schedule pool exhausted, cannot register recurring job"
            );
            return false;
        };

        let cancel = CancellationToken::new();
        let task_token = cancel.clone();
        let initial_delay = self.initial_delay;
        let id = job_id.to_string();

        tokio::spawn(async move {
            let first = tokio::time::Instant::now() + initial_delay;
            let mut interval = tokio::time::interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!(job_id = %id, "recurring timer cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        tick().await;
                    }
                }
            }
            // Frees the schedule-pool slot.
            drop(permit);
        });

        if let Some(old) = self
            .entries
            .insert(job_id.to_string(), ScheduledTaskHandle { cancel })
        {
            info!(job_id, "replacing existing recurring timer");
            old.cancel.cancel();
        }
        true
    }

    /// Cancels the timer for a job. Returns false when none is registered.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.entries.remove(job_id) {
            Some((_, handle)) => {
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every registered timer.
    pub fn cancel_all(&self) {
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.cancel(&id);
        }
    }

    /// Returns true while the job has a registered timer.
    pub fn contains(&self, job_id: &str) -> bool {
        self.entries.contains_key(job_id)
    }

    /// Number of registered timers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ScheduledTaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTaskRegistry")
            .field("registered", &self.entries.len())
            .field("pool", &self.pool)
            .finish()
    }
}
