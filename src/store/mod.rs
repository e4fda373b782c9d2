//! Persistence collaborator interface.
//!
//! The engine never owns durable storage. Everything it persists goes
//! through the [`JobStore`] trait, which a real deployment backs with a
//! document database. [`InMemoryJobStore`] provides a complete in-process
//! implementation for tests and embedders that don't need durability.
//!
//! The trait must support "read current state" semantics: the scheduled-tick
//! run body re-fetches the job and its result on every tick so that external
//! pause/update/delete take effect on the next tick.

mod memory;

pub use memory::InMemoryJobStore;

use crate::model::{Action, ActionStatus, Job, JobResult, JobStatus};
use thiserror::Error;

/// Errors surfaced by a [`JobStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot find job: {0}")]
    JobNotFound(String),

    #[error("cannot find job result: {0}")]
    JobResultNotFound(String),

    #[error("cannot find action: {0}")]
    ActionNotFound(String),

    /// Backend-specific failure (connection loss, serialization, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Document storage for jobs, job results and actions.
///
/// Implementations must be safe to call from multiple worker threads.
/// All lookups return `Ok(None)` for missing entities; the `*NotFound`
/// errors are raised by callers that require presence.
pub trait JobStore: Send + Sync {
    fn find_job(&self, id: &str) -> Result<Option<Job>, StoreError>;

    fn save_job(&self, job: &Job) -> Result<(), StoreError>;

    fn delete_job(&self, id: &str) -> Result<(), StoreError>;

    /// Returns the jobs under an action whose status is in `statuses`.
    /// An empty filter matches every status.
    fn find_jobs_by_action(
        &self,
        action_id: &str,
        statuses: &[JobStatus],
    ) -> Result<Vec<Job>, StoreError>;

    /// Returns every scheduled job in the given status, across all actions.
    /// Used for the startup re-registration scan.
    fn find_scheduled_jobs(&self, status: JobStatus) -> Result<Vec<Job>, StoreError>;

    fn delete_jobs_by_action(&self, action_id: &str) -> Result<(), StoreError>;

    fn find_job_result(&self, id: &str) -> Result<Option<JobResult>, StoreError>;

    fn find_job_result_by_job(&self, job_id: &str) -> Result<Option<JobResult>, StoreError>;

    fn save_job_result(&self, result: &JobResult) -> Result<(), StoreError>;

    fn delete_job_results_by_job(&self, job_id: &str) -> Result<(), StoreError>;

    fn delete_job_results_by_action(&self, action_id: &str) -> Result<(), StoreError>;

    fn find_action(&self, id: &str) -> Result<Option<Action>, StoreError>;

    fn save_action(&self, action: &Action) -> Result<(), StoreError>;

    fn delete_action(&self, id: &str) -> Result<(), StoreError>;

    fn find_actions_by_status(&self, status: ActionStatus) -> Result<Vec<Action>, StoreError>;
}
