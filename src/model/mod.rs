//! Domain entities for actions, jobs and their execution results.
//!
//! The engine does not own durable storage for these types - they are
//! persisted by the [`store`](crate::store) collaborator and passed to the
//! engine by value per dispatch. The 1:1 relationship between a [`Job`] and
//! its [`JobResult`] is established at job-initialization time and the
//! result record is mutated only by the execution engine.

mod action;
mod job;
mod result;

pub use action::{Action, ActionStatus};
pub use job::{Job, JobCategory, JobStatus, OutputTarget, ScheduleUnit};
pub use result::{ExecutionStatus, JobResult, JobState};
