//! Job dispatch and scheduling engine.
//!
//! The engine executes jobs grouped under actions, routing each run onto
//! the right vehicle and keeping per-action statistics consistent while
//! completions stream in concurrently.
//!
//! # Architecture
//!
//! ```text
//! BulkExecutionCoordinator          action-level batches, lifecycle, stats
//!         |
//!         v
//!   JobDispatcher                   routing: timer / pool / inline
//!    |    |     |
//!    |    |     +-- ScheduledTaskRegistry   fixed-rate timers, no catch-up
//!    |    +-------- WorkerPools             bounded IO / CPU / schedule pools
//!    +------------- JobExecutionLock        at-most-one run per job
//!         |
//!         v
//!     run body                      gate, lock, persist, execute, publish
//!         |
//!         v
//!   ActionStatsStore                transition-table counter updates
//! ```
//!
//! Every wait in the engine is bounded: pool submits, execution locks and
//! stats locks all give up after a configured timeout instead of queueing
//! work. A dropped stats update or a skipped run is logged, never retried.
//!
//! # Example
//!
//! ```ignore
//! use actionflow::engine::{
//!     ActionExecutionContext, ActionStatsStore, BulkExecutionCoordinator,
//!     EngineConfig, JobDispatcher,
//! };
//! use actionflow::metrics::InMemoryMetricSink;
//! use actionflow::model::{Action, Job};
//! use actionflow::script::EchoScriptEngine;
//! use actionflow::store::InMemoryJobStore;
//! use std::sync::Arc;
//!
//! let config = EngineConfig::default();
//! let dispatcher = Arc::new(JobDispatcher::new(
//!     Arc::new(InMemoryJobStore::new()),
//!     Arc::new(EchoScriptEngine),
//!     Arc::new(InMemoryMetricSink::new()),
//!     config.clone(),
//! ));
//! let stats = Arc::new(ActionStatsStore::new(config.lock_timeout));
//! let coordinator = BulkExecutionCoordinator::new(dispatcher, stats);
//!
//! let action = Action::new("nightly-checks");
//! coordinator.register_action(&action)?;
//! let job = Job::new("disk-usage", &action.id);
//! let result = coordinator.initialize_job(&job).await?;
//!
//! let ctx = ActionExecutionContext::new(action.clone())
//!     .with_pair(&job.id, &result.id)
//!     .with_callback(coordinator.stats_callback(&action.id));
//! let report = coordinator.run(&ctx).await;
//! ```

mod config;
mod context;
mod coordinator;
mod dispatcher;
mod execution_lock;
mod lifecycle;
mod pools;
mod run;
mod schedule;
mod stats;
mod transition;

pub use config::{
    EngineConfig, DEFAULT_INITIAL_SCHEDULE_DELAY, DEFAULT_LOCK_TIMEOUT, DEFAULT_SHUTDOWN_WAIT,
    DEFAULT_SUBMIT_TIMEOUT,
};
pub use context::{
    noop_callback, status_callback, ActionExecutionContext, StatusChangeCallback,
};
pub use coordinator::{BatchReport, BulkExecutionCoordinator};
pub use dispatcher::{DispatchOutcome, JobDispatcher};
pub use execution_lock::{JobExecutionGuard, JobExecutionLock};
pub use lifecycle::EngineError;
pub use pools::{
    default_cpu_pool_size, PoolKind, SubmitError, WorkerPermit, WorkerPool, WorkerPools,
    DEFAULT_IO_POOL_SIZE, DEFAULT_SCHEDULE_POOL_SIZE,
};
pub use run::{metric_prefix, METRIC_PREFIX};
pub use schedule::ScheduledTaskRegistry;
pub use stats::{ActionStatsSnapshot, ActionStatsStore};
pub use transition::{transition_op, StatsOp};
