//! Per-action statistics store.
//!
//! Keeps one set of counters per action, updated only through the
//! status-transition table. Every mutating operation takes a per-action
//! lock with a bounded wait; on timeout the update is abandoned and logged
//! as an error - not retried and not queued. This is a deliberate
//! backpressure choice (bounded latency over completeness), so a heavily
//! contended stats update can be dropped. Reads never take the lock and
//! return an eventually-consistent snapshot.
//!
//! Entries live in a [`DashMap`] keyed by action id, so updates for
//! unrelated actions never contend with each other.

use super::transition::{transition_op, StatsOp};
use crate::model::ExecutionStatus;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Point-in-time view of one action's counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ActionStatsSnapshot {
    pub number_of_jobs: u64,
    pub number_of_success_jobs: u64,
    pub number_of_failure_jobs: u64,
    pub number_of_pending_jobs: u64,
    pub number_of_schedule_jobs: u64,
}

/// Counters plus the per-action update lock.
#[derive(Default)]
struct StatsEntry {
    jobs: AtomicU64,
    success: AtomicU64,
    failure: AtomicU64,
    pending: AtomicU64,
    scheduled: AtomicU64,
    /// Serializes counter updates for this action only.
    lock: Mutex<()>,
}

impl StatsEntry {
    fn snapshot(&self) -> ActionStatsSnapshot {
        ActionStatsSnapshot {
            number_of_jobs: self.jobs.load(Ordering::Relaxed),
            number_of_success_jobs: self.success.load(Ordering::Relaxed),
            number_of_failure_jobs: self.failure.load(Ordering::Relaxed),
            number_of_pending_jobs: self.pending.load(Ordering::Relaxed),
            number_of_schedule_jobs: self.scheduled.load(Ordering::Relaxed),
        }
    }
}

/// Decrements a counter, saturating at zero.
fn decrement(counter: &AtomicU64) {
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
        Some(v.saturating_sub(1))
    });
}

/// In-memory per-action statistics, keyed by action id.
///
/// Created when an action is created or loaded, removed when the action is
/// deleted. Not persisted by the engine; rebuilt from stored job/result
/// state at process startup.
pub struct ActionStatsStore {
    entries: DashMap<String, Arc<StatsEntry>>,
    lock_timeout: Duration,
}

impl ActionStatsStore {
    /// Creates a store whose per-action locks give up after `lock_timeout`.
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            lock_timeout,
        }
    }

    /// Registers an action with zeroed counters.
    ///
    /// Re-initializing an existing action resets its counters.
    pub fn init(&self, action_id: &str) {
        self.entries
            .insert(action_id.to_string(), Arc::new(StatsEntry::default()));
    }

    /// Drops the counters for a deleted action.
    pub fn remove(&self, action_id: &str) {
        self.entries.remove(action_id);
    }

    /// Number of tracked actions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a lock-free snapshot of an action's counters.
    pub fn get(&self, action_id: &str) -> Option<ActionStatsSnapshot> {
        self.entries.get(action_id).map(|e| e.snapshot())
    }

    /// Applies the statistics delta for one observed status transition.
    ///
    /// Looks up the operation in the transition table and applies it under
    /// the action's lock. An unmapped pair logs an error and changes
    /// nothing; a lock timeout logs an error and drops the update.
    pub async fn apply_transition(
        &self,
        action_id: &str,
        prev: Option<ExecutionStatus>,
        next: ExecutionStatus,
    ) {
        let op = transition_op(prev, next);
        debug!(action_id, ?prev, %next, ?op, "applying status transition");

        match op {
            StatsOp::NoOp => return,
            StatsOp::Unmapped => {
                error!(
                    action_id,
                    ?prev,
                    %next,
                    "unmapped status transition, leaving counters untouched"
                );
                return;
            }
            _ => {}
        }

        self.with_entry_locked(action_id, |entry| match op {
            StatsOp::AddSuccess => {
                entry.success.fetch_add(1, Ordering::Relaxed);
            }
            StatsOp::AddFailure => {
                entry.failure.fetch_add(1, Ordering::Relaxed);
            }
            StatsOp::SuccessFromFailure => {
                entry.success.fetch_add(1, Ordering::Relaxed);
                decrement(&entry.failure);
            }
            StatsOp::FailureFromSuccess => {
                decrement(&entry.success);
                entry.failure.fetch_add(1, Ordering::Relaxed);
            }
            StatsOp::SuccessFromPending => {
                decrement(&entry.pending);
                entry.success.fetch_add(1, Ordering::Relaxed);
            }
            StatsOp::FailureFromPending => {
                decrement(&entry.pending);
                entry.failure.fetch_add(1, Ordering::Relaxed);
            }
            StatsOp::NoOp | StatsOp::Unmapped => unreachable!("filtered above"),
        })
        .await;
    }

    /// Adds to the job count, e.g. when new jobs join an existing action.
    pub async fn add_jobs(&self, action_id: &str, delta: u64) {
        self.with_entry_locked(action_id, |entry| {
            entry.jobs.fetch_add(delta, Ordering::Relaxed);
        })
        .await;
    }

    /// Adds to the scheduled-job count.
    pub async fn add_scheduled(&self, action_id: &str, delta: u64) {
        self.with_entry_locked(action_id, |entry| {
            entry.scheduled.fetch_add(delta, Ordering::Relaxed);
        })
        .await;
    }

    /// Adds to the pending-job count.
    pub async fn add_pending(&self, action_id: &str, delta: u64) {
        self.with_entry_locked(action_id, |entry| {
            entry.pending.fetch_add(delta, Ordering::Relaxed);
        })
        .await;
    }

    /// Runs `mutate` under the action's lock, bounded by the lock timeout.
    async fn with_entry_locked<F>(&self, action_id: &str, mutate: F)
    where
        F: FnOnce(&StatsEntry),
    {
        let Some(entry) = self.entries.get(action_id).map(|e| Arc::clone(&e)) else {
            error!(action_id, "no stats entry for action, dropping update");
            return;
        };

        match tokio::time::timeout(self.lock_timeout, entry.lock.lock()).await {
            Ok(_guard) => mutate(&entry),
            Err(_) => {
                error!(
                    action_id,
                    timeout_ms = self.lock_timeout.as_millis() as u64,
                    "cannot get action stats lock, dropping update"
                );
            }
        };
    }
}
