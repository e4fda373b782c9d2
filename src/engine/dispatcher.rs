//! Job dispatch routing.
//!
//! [`JobDispatcher`] owns the worker pools, the recurring-task registry and
//! the per-job execution locks, and decides where each job runs:
//!
//! 1. Scheduled jobs (outside relay execution) register a fixed-rate timer
//!    whose ticks re-fetch the job and its result before each run, so
//!    external pause/update/delete take effect on the next tick.
//! 2. Async jobs, and every job during relay execution, submit to the IO or
//!    CPU pool by job category.
//! 3. Everything else runs inline on the caller's task.
//!
//! Relay execution exists so a scheduled job can also be triggered on
//! demand: the relay flag bypasses timer registration and forces the run
//! onto a pool.

use super::config::EngineConfig;
use super::context::StatusChangeCallback;
use super::execution_lock::JobExecutionLock;
use super::pools::{PoolKind, WorkerPools};
use super::run::run_job_guarded;
use super::schedule::ScheduledTaskRegistry;
use crate::metrics::MetricSink;
use crate::model::{Action, Job, JobResult};
use crate::script::ScriptEngine;
use crate::store::JobStore;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Where a dispatched job ended up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DispatchOutcome {
    /// A recurring timer was registered (or replaced) for the job.
    Scheduled,
    /// The schedule pool had no free slot; nothing was registered.
    ScheduleCapacityExhausted,
    /// The run was submitted to a worker pool.
    Submitted(PoolKind),
    /// The target pool stayed saturated past the submit bound.
    Rejected(PoolKind),
    /// The run executed inline and has already completed.
    RanInline,
}

/// Routes job runs onto timers, worker pools or the caller's task.
pub struct JobDispatcher {
    store: Arc<dyn JobStore>,
    script: Arc<dyn ScriptEngine>,
    metrics: Arc<dyn MetricSink>,
    pools: WorkerPools,
    registry: ScheduledTaskRegistry,
    execution_lock: Arc<JobExecutionLock>,
    config: EngineConfig,
}

impl JobDispatcher {
    /// Creates a dispatcher with pools and registries sized per `config`.
    pub fn new(
        store: Arc<dyn JobStore>,
        script: Arc<dyn ScriptEngine>,
        metrics: Arc<dyn MetricSink>,
        config: EngineConfig,
    ) -> Self {
        let pools = WorkerPools::new(
            config.io_pool_size,
            config.cpu_pool_size,
            config.schedule_pool_size,
            config.submit_timeout,
        );
        let registry = ScheduledTaskRegistry::new(
            Arc::clone(pools.schedule()),
            config.initial_schedule_delay,
        );
        let execution_lock = Arc::new(JobExecutionLock::new(config.lock_timeout));
        Self {
            store,
            script,
            metrics,
            pools,
            registry,
            execution_lock,
            config,
        }
    }

    /// Dispatches one job run.
    ///
    /// `result` must be the job's current result record; scheduled jobs
    /// ignore it after registration and re-fetch fresh state on every tick.
    pub async fn dispatch(
        &self,
        job: &Job,
        result: JobResult,
        action: &Action,
        on_status_change: &StatusChangeCallback,
        is_relay: bool,
    ) -> DispatchOutcome {
        if job.is_scheduled && !is_relay {
            return self.register_recurring(job, action, on_status_change);
        }

        if job.is_async || is_relay {
            return self
                .submit_to_pool(job, result, action, on_status_change)
                .await;
        }

        debug!(job_id = %job.id, job_name = %job.name, "running job inline");
        run_job_guarded(
            &self.store,
            &self.script,
            &self.metrics,
            &self.execution_lock,
            action,
            job,
            result,
            on_status_change,
        )
        .await;
        DispatchOutcome::RanInline
    }

    fn register_recurring(
        &self,
        job: &Job,
        action: &Action,
        on_status_change: &StatusChangeCallback,
    ) -> DispatchOutcome {
        let store = Arc::clone(&self.store);
        let script = Arc::clone(&self.script);
        let metrics = Arc::clone(&self.metrics);
        let execution_lock = Arc::clone(&self.execution_lock);
        let job_id = job.id.clone();
        let action = action.clone();
        let callback = Arc::clone(on_status_change);

        let registered = self.registry.register(&job.id, job.schedule_period(), move || {
            scheduled_tick(
                Arc::clone(&store),
                Arc::clone(&script),
                Arc::clone(&metrics),
                Arc::clone(&execution_lock),
                job_id.clone(),
                action.clone(),
                Arc::clone(&callback),
            )
        });

        if registered {
            info!(
                job_id = %job.id,
                job_name = %job.name,
                period_ms = job.schedule_period().as_millis() as u64,
                "registered recurring job"
            );
            DispatchOutcome::Scheduled
        } else {
            DispatchOutcome::ScheduleCapacityExhausted
        }
    }

    async fn submit_to_pool(
        &self,
        job: &Job,
        result: JobResult,
        action: &Action,
        on_status_change: &StatusChangeCallback,
    ) -> DispatchOutcome {
        let pool = self.pools.for_category(job.category);
        let kind = pool.kind();

        let store = Arc::clone(&self.store);
        let script = Arc::clone(&self.script);
        let metrics = Arc::clone(&self.metrics);
        let execution_lock = Arc::clone(&self.execution_lock);
        let job = job.clone();
        let action = action.clone();
        let callback = Arc::clone(on_status_change);
        let job_id = job.id.clone();
        let job_name = job.name.clone();

        let submitted = pool
            .submit(async move {
                run_job_guarded(
                    &store,
                    &script,
                    &metrics,
                    &execution_lock,
                    &action,
                    &job,
                    result,
                    &callback,
                )
                .await;
            })
            .await;

        match submitted {
            Ok(()) => {
                debug!(job_id = %job_id, job_name = %job_name, pool = %kind, "job submitted");
                DispatchOutcome::Submitted(kind)
            }
            Err(e) => {
                error!(job_id = %job_id, job_name = %job_name, error = %e, "pool rejected job");
                DispatchOutcome::Rejected(kind)
            }
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn script_engine(&self) -> &Arc<dyn ScriptEngine> {
        &self.script
    }

    pub fn metrics(&self) -> &Arc<dyn MetricSink> {
        &self.metrics
    }

    pub fn pools(&self) -> &WorkerPools {
        &self.pools
    }

    pub fn registry(&self) -> &ScheduledTaskRegistry {
        &self.registry
    }

    pub fn execution_lock(&self) -> &JobExecutionLock {
        &self.execution_lock
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cancels every recurring timer and drains the pools.
    ///
    /// Returns false when in-flight work outlived the configured shutdown
    /// wait.
    pub async fn shutdown(&self) -> bool {
        self.registry.cancel_all();
        self.pools.shutdown(self.config.shutdown_wait).await
    }
}

impl std::fmt::Debug for JobDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDispatcher")
            .field("pools", &self.pools)
            .field("registry", &self.registry)
            .finish()
    }
}

/// One tick of a recurring job: re-fetch current state, then run.
async fn scheduled_tick(
    store: Arc<dyn JobStore>,
    script: Arc<dyn ScriptEngine>,
    metrics: Arc<dyn MetricSink>,
    execution_lock: Arc<JobExecutionLock>,
    job_id: String,
    action: Action,
    on_status_change: StatusChangeCallback,
) {
    let job = match store.find_job(&job_id) {
        Ok(Some(job)) => job,
        Ok(None) => {
            error!(job_id = %job_id, "scheduled job no longer exists, skipping tick");
            return;
        }
        Err(e) => {
            error!(job_id = %job_id, error = %e, "cannot load scheduled job, skipping tick");
            return;
        }
    };
    let result = match store.find_job_result_by_job(&job_id) {
        Ok(Some(result)) => result,
        Ok(None) => {
            error!(job_id = %job_id, "scheduled job has no result record, skipping tick");
            return;
        }
        Err(e) => {
            error!(job_id = %job_id, error = %e, "cannot load job result, skipping tick");
            return;
        }
    };

    run_job_guarded(
        &store,
        &script,
        &metrics,
        &execution_lock,
        &action,
        &job,
        result,
        &on_status_change,
    )
    .await;
}
