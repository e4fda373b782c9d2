//! ActionFlow - job dispatch, scheduling and statistics aggregation
//!
//! This library executes jobs grouped under actions: one-shot runs inline,
//! async runs on bounded IO/CPU pools, and recurring runs on fixed-rate
//! timers, with per-action statistics kept consistent under concurrent
//! completions.
//!
//! # High-Level API
//!
//! The [`engine`] module is the main entry point:
//!
//! ```ignore
//! use actionflow::engine::{BulkExecutionCoordinator, EngineConfig, JobDispatcher};
//!
//! let dispatcher = Arc::new(JobDispatcher::new(store, script, metrics, config));
//! let coordinator = BulkExecutionCoordinator::new(dispatcher, stats);
//! coordinator.restore_scheduled_jobs().await?;
//! ```
//!
//! Persistence, script execution and metric emission are collaborator
//! traits ([`store::JobStore`], [`script::ScriptEngine`],
//! [`metrics::MetricSink`]); in-memory implementations ship for tests and
//! embedders.

pub mod engine;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod script;
pub mod store;
pub mod time;

/// Version of the ActionFlow library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
