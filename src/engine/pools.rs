//! Bounded worker pools.
//!
//! Three independent pools back job execution:
//!
//! - **IO pool**: async jobs with `JobCategory::Io` (default 20 slots).
//! - **CPU pool**: async jobs with `JobCategory::Cpu` (one slot per
//!   available processing unit).
//! - **Schedule pool**: hosts recurring-task timers only, never the run
//!   bodies themselves (default 100 slots).
//!
//! Each pool is a semaphore-backed capacity limiter in front of spawned
//! tasks. `submit` blocks the caller up to the pool's await bound when the
//! pool is saturated, then gives up with [`SubmitError::Saturated`]. Pools
//! expose saturation and availability counts and support a graceful drain
//! on shutdown.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

/// Default IO pool capacity.
pub const DEFAULT_IO_POOL_SIZE: usize = 20;

/// Default schedule pool capacity (recurring-task timers).
pub const DEFAULT_SCHEDULE_POOL_SIZE: usize = 100;

/// Fallback CPU count when detection fails.
pub const FALLBACK_CPU_COUNT: usize = 4;

/// Returns the default CPU pool capacity.
pub fn default_cpu_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(FALLBACK_CPU_COUNT)
}

/// Which pool a task runs on.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum PoolKind {
    Io,
    Cpu,
    Schedule,
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io => write!(f, "IO"),
            Self::Cpu => write!(f, "CPU"),
            Self::Schedule => write!(f, "Schedule"),
        }
    }
}

/// Error returned when a pool cannot accept work.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{kind} pool saturated, no permit within {waited_ms} ms")]
    Saturated { kind: PoolKind, waited_ms: u64 },
}

/// A capacity slot held for the lifetime of one pool task.
///
/// Dropping the permit releases the slot and decrements the in-flight
/// count.
pub struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
    kind: PoolKind,
}

impl WorkerPermit {
    /// Returns which pool this permit belongs to.
    pub fn kind(&self) -> PoolKind {
        self.kind
    }
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for WorkerPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPermit").field("kind", &self.kind).finish()
    }
}

/// A semaphore-backed bounded pool for one kind of work.
pub struct WorkerPool {
    kind: PoolKind,
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: AtomicUsize,
    submit_timeout: Duration,
}

impl WorkerPool {
    /// Creates a pool with the given capacity and submit wait bound.
    pub fn new(kind: PoolKind, capacity: usize, submit_timeout: Duration) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            kind,
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: AtomicUsize::new(0),
            submit_timeout,
        }
    }

    /// Submits a task to the pool.
    ///
    /// Waits up to the pool's submit bound for a free slot, then spawns the
    /// future with the slot held until it completes. A saturated pool past
    /// the bound returns [`SubmitError::Saturated`] without running the
    /// task.
    pub async fn submit<F>(&self, task: F) -> Result<(), SubmitError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = match tokio::time::timeout(
            self.submit_timeout,
            self.semaphore.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            _ => {
                return Err(SubmitError::Saturated {
                    kind: self.kind,
                    waited_ms: self.submit_timeout.as_millis() as u64,
                })
            }
        };

        let permit = self.wrap_permit(permit);
        tokio::spawn(async move {
            task.await;
            drop(permit);
        });
        Ok(())
    }

    /// Tries to take a capacity slot without waiting.
    ///
    /// Used by the scheduled-task registry, which needs `None` immediately
    /// when the schedule pool is exhausted instead of a bounded wait.
    pub fn try_acquire(&self) -> Option<WorkerPermit> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        Some(self.wrap_permit(permit))
    }

    fn wrap_permit(&self, permit: OwnedSemaphorePermit) -> WorkerPermit {
        let current = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.update_peak(current);
        WorkerPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
            kind: self.kind,
        }
    }

    fn update_peak(&self, current: usize) {
        let mut peak = self.peak_in_flight.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_in_flight.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    /// Returns which kind of pool this is.
    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// Total capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots right now.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Tasks currently holding a slot.
    pub fn active_count(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Highest concurrent slot usage observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    /// Waits for in-flight tasks to drain, up to `max_wait`.
    ///
    /// Returns true when the pool drained fully, false when the wait
    /// expired with work still in flight.
    pub async fn shutdown(&self, max_wait: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + max_wait;
        while self.active_count() > 0 {
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    pool = %self.kind,
                    in_flight = self.active_count(),
                    "shutdown wait expired with tasks still in flight"
                );
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("kind", &self.kind)
            .field(
                "usage",
                &format_args!("{}/{}", self.active_count(), self.capacity),
            )
            .finish()
    }
}

/// The three pools behind the dispatcher.
pub struct WorkerPools {
    io: Arc<WorkerPool>,
    cpu: Arc<WorkerPool>,
    schedule: Arc<WorkerPool>,
}

impl WorkerPools {
    /// Creates the pools with explicit capacities and a shared submit
    /// bound.
    pub fn new(
        io_capacity: usize,
        cpu_capacity: usize,
        schedule_capacity: usize,
        submit_timeout: Duration,
    ) -> Self {
        Self {
            io: Arc::new(WorkerPool::new(PoolKind::Io, io_capacity, submit_timeout)),
            cpu: Arc::new(WorkerPool::new(PoolKind::Cpu, cpu_capacity, submit_timeout)),
            schedule: Arc::new(WorkerPool::new(
                PoolKind::Schedule,
                schedule_capacity,
                submit_timeout,
            )),
        }
    }

    /// Returns the pool for async jobs of the given category.
    pub fn for_category(&self, category: crate::model::JobCategory) -> &Arc<WorkerPool> {
        match category {
            crate::model::JobCategory::Io => &self.io,
            crate::model::JobCategory::Cpu => &self.cpu,
        }
    }

    pub fn io(&self) -> &Arc<WorkerPool> {
        &self.io
    }

    pub fn cpu(&self) -> &Arc<WorkerPool> {
        &self.cpu
    }

    pub fn schedule(&self) -> &Arc<WorkerPool> {
        &self.schedule
    }

    /// Drains all three pools, sharing the same wait bound.
    pub async fn shutdown(&self, max_wait: Duration) -> bool {
        let io = self.io.shutdown(max_wait).await;
        let cpu = self.cpu.shutdown(max_wait).await;
        let schedule = self.schedule.shutdown(max_wait).await;
        io && cpu && schedule
    }
}

impl std::fmt::Debug for WorkerPools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPools")
            .field("io", &self.io)
            .field("cpu", &self.cpu)
            .field("schedule", &self.schedule)
            .finish()
    }
}
