//! Execution-outcome record for a job.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The execution-outcome record for a job, tracking state, status and timings.
///
/// One `JobResult` exists per job, created at job-initialization time. The
/// record cycles `Processing -> {Success, Failure}` on every run of a
/// recurring job; `started_at` is set exactly once, on the first transition
/// into `Processing`, so `elapsed_ms` accumulates total elapsed time from
/// the first start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobResult {
    pub id: String,
    pub job_id: String,
    pub action_id: String,
    pub state: JobState,
    pub status: ExecutionStatus,
    pub failure_notes: Option<String>,
    pub created_at: u64,
    /// Epoch millis of the first run start; 0 until the job has ever run.
    pub started_at: u64,
    pub updated_at: u64,
    pub ended_at: u64,
    /// `ended_at - started_at` as of the last terminal transition.
    pub elapsed_ms: u64,
}

impl JobResult {
    /// Creates the initial PENDING result record for a job.
    pub fn pending(job_id: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_id: job_id.into(),
            action_id: action_id.into(),
            state: JobState::Initial,
            status: ExecutionStatus::Pending,
            failure_notes: None,
            created_at: crate::time::epoch_millis(),
            started_at: 0,
            updated_at: 0,
            ended_at: 0,
            elapsed_ms: 0,
        }
    }

    /// Returns the previous status to report to the completion callback.
    ///
    /// `None` until the job's first run has completed (the result is still in
    /// its initial state), afterwards the last recorded execution status.
    pub fn previous_status(&self) -> Option<ExecutionStatus> {
        match self.state {
            JobState::Initial => None,
            JobState::Completed => Some(self.status),
        }
    }
}

/// Coarse lifecycle of the result record.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum JobState {
    /// Created but never completed a run.
    #[default]
    Initial,
    /// At least one run has reached a terminal status.
    Completed,
}

/// Fine-grained execution status of the most recent run.
///
/// `Pending -> Processing -> {Success, Failure}`; the terminal statuses are
/// re-enterable for scheduled jobs (each tick starts a fresh `Processing`
/// phase from whichever terminal status the previous tick left behind).
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Processing,
    Success,
    Failure,
}

impl ExecutionStatus {
    /// Returns true for the terminal statuses.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Processing => write!(f, "Processing"),
            Self::Success => write!(f, "Success"),
            Self::Failure => write!(f, "Failure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_result() {
        let result = JobResult::pending("job-1", "action-1");
        assert_eq!(result.job_id, "job-1");
        assert_eq!(result.action_id, "action-1");
        assert_eq!(result.state, JobState::Initial);
        assert_eq!(result.status, ExecutionStatus::Pending);
        assert_eq!(result.started_at, 0);
        assert!(result.failure_notes.is_none());
    }

    #[test]
    fn test_previous_status_initial() {
        let result = JobResult::pending("j", "a");
        assert_eq!(result.previous_status(), None);
    }

    #[test]
    fn test_previous_status_completed() {
        let mut result = JobResult::pending("j", "a");
        result.state = JobState::Completed;
        result.status = ExecutionStatus::Failure;
        assert_eq!(result.previous_status(), Some(ExecutionStatus::Failure));
    }

    #[test]
    fn test_is_terminal() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Processing.is_terminal());
        assert!(ExecutionStatus::Success.is_terminal());
        assert!(ExecutionStatus::Failure.is_terminal());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(format!("{}", ExecutionStatus::Processing), "Processing");
        assert_eq!(format!("{}", ExecutionStatus::Success), "Success");
    }
}
