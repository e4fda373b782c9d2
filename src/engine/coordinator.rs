//! Action-level coordination.
//!
//! [`BulkExecutionCoordinator`] sits above the dispatcher and works in
//! units of actions: it initializes jobs with their result records,
//! executes a whole batch under one [`ActionExecutionContext`], wires
//! completed runs into the per-action statistics, and drives action
//! archive/restore/delete. A missing entity inside a batch is logged and
//! skipped; the rest of the batch still runs.

use super::context::{status_callback, ActionExecutionContext, StatusChangeCallback};
use super::dispatcher::{DispatchOutcome, JobDispatcher};
use super::lifecycle::EngineError;
use super::stats::ActionStatsStore;
use crate::model::{ActionStatus, Job, JobResult, JobStatus};
use crate::time::epoch_millis;
use std::sync::Arc;
use tracing::{info, warn};

/// What happened to each pair of a batch execution.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Dispatch outcome per job id, in dispatch order.
    pub dispatched: Vec<(String, DispatchOutcome)>,
    /// Job ids whose job or result record could not be loaded.
    pub skipped: Vec<String>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Coordinates batches of job executions and action lifecycle.
pub struct BulkExecutionCoordinator {
    dispatcher: Arc<JobDispatcher>,
    stats: Arc<ActionStatsStore>,
}

impl BulkExecutionCoordinator {
    pub fn new(dispatcher: Arc<JobDispatcher>, stats: Arc<ActionStatsStore>) -> Self {
        Self { dispatcher, stats }
    }

    pub fn dispatcher(&self) -> &Arc<JobDispatcher> {
        &self.dispatcher
    }

    pub fn stats(&self) -> &Arc<ActionStatsStore> {
        &self.stats
    }

    /// Returns a status-change callback that feeds the action's statistics.
    ///
    /// The run body awaits the callback while holding the job's execution
    /// lock, so transitions for one job reach the counters in completion
    /// order.
    pub fn stats_callback(&self, action_id: &str) -> StatusChangeCallback {
        let stats = Arc::clone(&self.stats);
        let action_id = action_id.to_string();
        status_callback(move |prev, next| {
            let stats = Arc::clone(&stats);
            let action_id = action_id.clone();
            async move {
                stats.apply_transition(&action_id, prev, next).await;
            }
        })
    }

    /// Registers an action and zeroes its statistics.
    pub fn register_action(&self, action: &crate::model::Action) -> Result<(), EngineError> {
        self.dispatcher.store().save_action(action)?;
        self.stats.init(&action.id);
        info!(action_id = %action.id, action_name = %action.name, "action registered");
        Ok(())
    }

    /// Persists a new job with its initial PENDING result record and bumps
    /// the owning action's counters.
    pub async fn initialize_job(&self, job: &Job) -> Result<JobResult, EngineError> {
        self.dispatcher.store().save_job(job)?;
        let result = JobResult::pending(&job.id, &job.action_id);
        self.dispatcher.store().save_job_result(&result)?;

        self.stats.add_jobs(&job.action_id, 1).await;
        self.stats.add_pending(&job.action_id, 1).await;
        if job.is_scheduled {
            self.stats.add_scheduled(&job.action_id, 1).await;
        }

        info!(
            job_id = %job.id,
            job_name = %job.name,
            action_id = %job.action_id,
            "job initialized"
        );
        Ok(result)
    }

    /// Executes every job/result pair of a context.
    ///
    /// Pairs whose job or result record cannot be loaded are reported in
    /// [`BatchReport::skipped`]; the remaining pairs still dispatch.
    pub async fn run(&self, ctx: &ActionExecutionContext) -> BatchReport {
        let mut report = BatchReport::default();

        for (job_id, result_id) in &ctx.job_result_pairs {
            let job = match self.dispatcher.store().find_job(job_id) {
                Ok(Some(job)) => job,
                Ok(None) => {
                    warn!(job_id = %job_id, "job not found, skipping batch entry");
                    report.skipped.push(job_id.clone());
                    continue;
                }
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "cannot load job, skipping batch entry");
                    report.skipped.push(job_id.clone());
                    continue;
                }
            };
            let result = match self.dispatcher.store().find_job_result(result_id) {
                Ok(Some(result)) => result,
                Ok(None) => {
                    warn!(job_id = %job_id, result_id = %result_id, "job result not found, skipping batch entry");
                    report.skipped.push(job_id.clone());
                    continue;
                }
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "cannot load job result, skipping batch entry");
                    report.skipped.push(job_id.clone());
                    continue;
                }
            };

            let outcome = self
                .dispatcher
                .dispatch(
                    &job,
                    result,
                    &ctx.action,
                    &ctx.on_status_change,
                    ctx.is_relay_action,
                )
                .await;
            report.dispatched.push((job_id.clone(), outcome));
        }

        report
    }

    /// Executes several contexts back to back.
    pub async fn run_all(&self, contexts: &[ActionExecutionContext]) -> Vec<BatchReport> {
        let mut reports = Vec::with_capacity(contexts.len());
        for ctx in contexts {
            reports.push(self.run(ctx).await);
        }
        reports
    }

    /// Archives an action: pauses all of its jobs and marks it archived.
    pub fn archive_action(&self, action_id: &str) -> Result<(), EngineError> {
        let mut action = self
            .dispatcher
            .store()
            .find_action(action_id)?
            .ok_or_else(|| EngineError::ActionNotFound(action_id.to_string()))?;

        for job in self.dispatcher.store().find_jobs_by_action(action_id, &[])? {
            self.dispatcher.pause_job(&job.id)?;
        }

        action.status = ActionStatus::Archived;
        self.dispatcher.store().save_action(&action)?;
        info!(action_id, action_name = %action.name, "action archived");
        Ok(())
    }

    /// Restores an archived action: reactivates it and re-registers its
    /// scheduled jobs with the stats-feeding callback.
    pub async fn restore_action(&self, action_id: &str) -> Result<(), EngineError> {
        let mut action = self
            .dispatcher
            .store()
            .find_action(action_id)?
            .ok_or_else(|| EngineError::ActionNotFound(action_id.to_string()))?;

        action.status = ActionStatus::Active;
        self.dispatcher.store().save_action(&action)?;

        let callback = self.stats_callback(action_id);
        for job in self
            .dispatcher
            .store()
            .find_jobs_by_action(action_id, &[JobStatus::Paused])?
        {
            if job.is_scheduled {
                self.dispatcher.resume_job(&job.id, &callback).await?;
            } else {
                let mut job = job;
                job.status = JobStatus::Active;
                job.updated_at = epoch_millis();
                self.dispatcher.store().save_job(&job)?;
            }
        }
        info!(action_id, action_name = %action.name, "action restored");
        Ok(())
    }

    /// Deletes an action with all of its jobs, results, timers, metrics and
    /// statistics.
    pub fn delete_action(&self, action_id: &str) -> Result<(), EngineError> {
        self.dispatcher.delete_jobs_for_action(action_id)?;
        self.dispatcher.store().delete_action(action_id)?;
        self.stats.remove(action_id);
        info!(action_id, "action deleted");
        Ok(())
    }

    /// Startup scan: re-registers the recurring timer of every scheduled
    /// active job under every active action.
    ///
    /// Returns the number of timers registered. Actions whose registration
    /// partially fails keep whatever did register; the scan continues.
    pub async fn restore_scheduled_jobs(&self) -> Result<usize, EngineError> {
        let mut registered = 0;
        for action in self
            .dispatcher
            .store()
            .find_actions_by_status(ActionStatus::Active)?
        {
            self.stats.init(&action.id);
            let callback = self.stats_callback(&action.id);

            for job in self
                .dispatcher
                .store()
                .find_jobs_by_action(&action.id, &[JobStatus::Active])?
            {
                if !job.is_scheduled {
                    continue;
                }
                let Some(result) = self.dispatcher.store().find_job_result_by_job(&job.id)? else {
                    warn!(job_id = %job.id, "scheduled job has no result record, not restoring");
                    continue;
                };

                self.stats.add_jobs(&action.id, 1).await;
                self.stats.add_scheduled(&action.id, 1).await;

                match self
                    .dispatcher
                    .dispatch(&job, result, &action, &callback, false)
                    .await
                {
                    DispatchOutcome::Scheduled => registered += 1,
                    outcome => {
                        warn!(job_id = %job.id, ?outcome, "could not restore scheduled job");
                    }
                }
            }
        }
        info!(registered, "restored scheduled jobs");
        Ok(registered)
    }
}

impl std::fmt::Debug for BulkExecutionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkExecutionCoordinator")
            .field("dispatcher", &self.dispatcher)
            .field("tracked_actions", &self.stats.len())
            .finish()
    }
}
