//! Engine tuning knobs.

use super::pools;
use std::time::Duration;

/// Bounded wait for per-job execution locks and per-action stats locks.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Bounded wait for a free worker-pool slot on submit.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Delay before the first tick of a newly registered recurring job.
pub const DEFAULT_INITIAL_SCHEDULE_DELAY: Duration = Duration::from_millis(1000);

/// Bounded wait for in-flight work to drain on shutdown.
pub const DEFAULT_SHUTDOWN_WAIT: Duration = Duration::from_millis(5000);

/// Configuration for the dispatch engine.
///
/// The defaults match production sizing: 20 IO slots, one CPU slot per
/// available processing unit, 100 recurring-timer slots, and 5-second
/// bounds on lock waits, pool submits and shutdown drain.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub io_pool_size: usize,
    pub cpu_pool_size: usize,
    pub schedule_pool_size: usize,
    pub lock_timeout: Duration,
    pub submit_timeout: Duration,
    pub initial_schedule_delay: Duration,
    pub shutdown_wait: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            io_pool_size: pools::DEFAULT_IO_POOL_SIZE,
            cpu_pool_size: pools::default_cpu_pool_size(),
            schedule_pool_size: pools::DEFAULT_SCHEDULE_POOL_SIZE,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            initial_schedule_delay: DEFAULT_INITIAL_SCHEDULE_DELAY,
            shutdown_wait: DEFAULT_SHUTDOWN_WAIT,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_io_pool_size(mut self, size: usize) -> Self {
        self.io_pool_size = size;
        self
    }

    pub fn with_cpu_pool_size(mut self, size: usize) -> Self {
        self.cpu_pool_size = size;
        self
    }

    pub fn with_schedule_pool_size(mut self, size: usize) -> Self {
        self.schedule_pool_size = size;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn with_initial_schedule_delay(mut self, delay: Duration) -> Self {
        self.initial_schedule_delay = delay;
        self
    }

    pub fn with_shutdown_wait(mut self, wait: Duration) -> Self {
        self.shutdown_wait = wait;
        self
    }
}
