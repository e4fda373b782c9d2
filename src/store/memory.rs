//! In-memory [`JobStore`] implementation.

use super::{JobStore, StoreError};
use crate::model::{Action, ActionStatus, Job, JobResult, JobStatus};
use dashmap::DashMap;

/// Concurrency-safe in-memory document store.
///
/// Backs tests and embedders without a database. Each entity family lives in
/// its own [`DashMap`], so reads and writes for unrelated ids never contend.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<String, Job>,
    results: DashMap<String, JobResult>,
    actions: DashMap<String, Action>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}

impl JobStore for InMemoryJobStore {
    fn find_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.get(id).map(|j| j.clone()))
    }

    fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        self.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    fn delete_job(&self, id: &str) -> Result<(), StoreError> {
        self.jobs.remove(id);
        Ok(())
    }

    fn find_jobs_by_action(
        &self,
        action_id: &str,
        statuses: &[JobStatus],
    ) -> Result<Vec<Job>, StoreError> {
        Ok(self
            .jobs
            .iter()
            .filter(|j| j.action_id == action_id)
            .filter(|j| statuses.is_empty() || statuses.contains(&j.status))
            .map(|j| j.clone())
            .collect())
    }

    fn find_scheduled_jobs(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        Ok(self
            .jobs
            .iter()
            .filter(|j| j.is_scheduled && j.status == status)
            .map(|j| j.clone())
            .collect())
    }

    fn delete_jobs_by_action(&self, action_id: &str) -> Result<(), StoreError> {
        self.jobs.retain(|_, j| j.action_id != action_id);
        Ok(())
    }

    fn find_job_result(&self, id: &str) -> Result<Option<JobResult>, StoreError> {
        Ok(self.results.get(id).map(|r| r.clone()))
    }

    fn find_job_result_by_job(&self, job_id: &str) -> Result<Option<JobResult>, StoreError> {
        Ok(self
            .results
            .iter()
            .find(|r| r.job_id == job_id)
            .map(|r| r.clone()))
    }

    fn save_job_result(&self, result: &JobResult) -> Result<(), StoreError> {
        self.results.insert(result.id.clone(), result.clone());
        Ok(())
    }

    fn delete_job_results_by_job(&self, job_id: &str) -> Result<(), StoreError> {
        self.results.retain(|_, r| r.job_id != job_id);
        Ok(())
    }

    fn delete_job_results_by_action(&self, action_id: &str) -> Result<(), StoreError> {
        self.results.retain(|_, r| r.action_id != action_id);
        Ok(())
    }

    fn find_action(&self, id: &str) -> Result<Option<Action>, StoreError> {
        Ok(self.actions.get(id).map(|a| a.clone()))
    }

    fn save_action(&self, action: &Action) -> Result<(), StoreError> {
        self.actions.insert(action.id.clone(), action.clone());
        Ok(())
    }

    fn delete_action(&self, id: &str) -> Result<(), StoreError> {
        self.actions.remove(id);
        Ok(())
    }

    fn find_actions_by_status(&self, status: ActionStatus) -> Result<Vec<Action>, StoreError> {
        Ok(self
            .actions
            .iter()
            .filter(|a| a.status == status)
            .map(|a| a.clone())
            .collect())
    }
}
