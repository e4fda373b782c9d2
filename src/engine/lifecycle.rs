//! Per-job lifecycle operations.
//!
//! Pause, resume, delete and dry-run for individual jobs. Unlike the run
//! body, these operations report their failures: a caller asking to pause
//! a job that doesn't exist gets an error, not a log line.

use super::context::StatusChangeCallback;
use super::dispatcher::{DispatchOutcome, JobDispatcher};
use super::run::{merge_configurations, metric_prefix};
use crate::model::{Job, JobStatus};
use crate::script::ScriptOutcome;
use crate::store::StoreError;
use crate::time::epoch_millis;
use thiserror::Error;
use tracing::info;

/// Errors surfaced by lifecycle and coordination operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot find job: {0}")]
    JobNotFound(String),

    #[error("cannot find job result for job: {0}")]
    JobResultNotFound(String),

    #[error("cannot find action: {0}")]
    ActionNotFound(String),

    #[error("job is not scheduled: {0}")]
    JobNotScheduled(String),
}

impl JobDispatcher {
    fn require_job(&self, job_id: &str) -> Result<Job, EngineError> {
        self.store()
            .find_job(job_id)?
            .ok_or_else(|| EngineError::JobNotFound(job_id.to_string()))
    }

    /// Pauses a job: future executions are refused by the status gate.
    ///
    /// A scheduled job also loses its recurring timer and any metrics it
    /// has published, so a paused job leaves no live readings behind.
    pub fn pause_job(&self, job_id: &str) -> Result<(), EngineError> {
        let mut job = self.require_job(job_id)?;

        if job.is_scheduled {
            self.registry().cancel(job_id);
        }
        self.clear_job_metrics(&job);

        job.status = JobStatus::Paused;
        job.updated_at = epoch_millis();
        self.store().save_job(&job)?;
        info!(job_id, job_name = %job.name, "job paused");
        Ok(())
    }

    /// Resumes a paused scheduled job and re-registers its timer.
    pub async fn resume_job(
        &self,
        job_id: &str,
        on_status_change: &StatusChangeCallback,
    ) -> Result<DispatchOutcome, EngineError> {
        let mut job = self.require_job(job_id)?;
        if !job.is_scheduled {
            return Err(EngineError::JobNotScheduled(job_id.to_string()));
        }

        job.status = JobStatus::Active;
        job.updated_at = epoch_millis();
        self.store().save_job(&job)?;

        let result = self
            .store()
            .find_job_result_by_job(job_id)?
            .ok_or_else(|| EngineError::JobResultNotFound(job_id.to_string()))?;
        let action = self
            .store()
            .find_action(&job.action_id)?
            .ok_or_else(|| EngineError::ActionNotFound(job.action_id.clone()))?;

        info!(job_id, job_name = %job.name, "job resumed");
        Ok(self
            .dispatch(&job, result, &action, on_status_change, false)
            .await)
    }

    /// Deletes a job, its result record, its timer and its metrics.
    pub fn delete_job(&self, job_id: &str) -> Result<(), EngineError> {
        let job = self.require_job(job_id)?;

        if job.is_scheduled {
            self.registry().cancel(job_id);
        }
        self.clear_job_metrics(&job);

        self.store().delete_job_results_by_job(job_id)?;
        self.store().delete_job(job_id)?;
        info!(job_id, job_name = %job.name, "job deleted");
        Ok(())
    }

    /// Deletes every job under an action, with their timers, results and
    /// metrics.
    pub fn delete_jobs_for_action(&self, action_id: &str) -> Result<(), EngineError> {
        let jobs = self.store().find_jobs_by_action(action_id, &[])?;
        for job in &jobs {
            if job.is_scheduled {
                self.registry().cancel(&job.id);
            }
            self.clear_job_metrics(job);
        }
        self.store().delete_jobs_by_action(action_id)?;
        self.store().delete_job_results_by_action(action_id)?;
        info!(action_id, jobs = jobs.len(), "deleted jobs for action");
        Ok(())
    }

    /// Executes a job's content once, without persistence, locking, output
    /// routing or callbacks.
    ///
    /// The status gate does not apply either: a dry run answers "what would
    /// this script produce", even for a paused job.
    pub fn dry_run(&self, job_id: &str) -> Result<ScriptOutcome, EngineError> {
        let job = self.require_job(job_id)?;
        let action = self
            .store()
            .find_action(&job.action_id)?
            .ok_or_else(|| EngineError::ActionNotFound(job.action_id.clone()))?;

        let outcome = match merge_configurations(&action.configuration, &job.configurations) {
            Ok(config) => self.script_engine().execute(&job.content, &config),
            Err(e) => ScriptOutcome::failure(e),
        };
        Ok(outcome)
    }

    fn clear_job_metrics(&self, job: &Job) {
        let prefix = metric_prefix(&job.name);
        for name in self.metrics().names_with_prefix(&prefix) {
            self.metrics().remove_metric(&name);
        }
    }
}
