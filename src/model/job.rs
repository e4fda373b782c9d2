//! Job entity and its classification enums.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Job statuses that the engine will accept for execution.
pub const VALID_STATUS_TO_RUN: [JobStatus; 2] = [JobStatus::Ready, JobStatus::Active];

/// A single executable unit: a templated script with a category, an optional
/// async flag and an optional recurring schedule.
///
/// Jobs belong to exactly one [`Action`](super::Action) via `action_id`.
/// The `configurations` field is an opaque JSON object merged with the owning
/// action's configuration before script execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub category: JobCategory,
    /// Opaque template text handed to the script engine.
    pub content: String,
    /// JSON object with job-level configuration, merged over the action's.
    pub configurations: String,
    pub is_async: bool,
    pub is_scheduled: bool,
    /// Recurrence interval, interpreted in `schedule_unit`. Must be >= 0;
    /// only meaningful when `is_scheduled` is set.
    pub schedule_interval: u64,
    pub schedule_unit: ScheduleUnit,
    pub output_targets: Vec<OutputTarget>,
    pub status: JobStatus,
    pub action_id: String,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Job {
    /// Creates a one-shot synchronous job with a generated id.
    pub fn new(name: impl Into<String>, action_id: impl Into<String>) -> Self {
        let now = crate::time::epoch_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            category: JobCategory::Io,
            content: String::new(),
            configurations: "{}".to_string(),
            is_async: false,
            is_scheduled: false,
            schedule_interval: 0,
            schedule_unit: ScheduleUnit::Seconds,
            output_targets: vec![OutputTarget::Console],
            status: JobStatus::Active,
            action_id: action_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the engine may run this job in its current status.
    pub fn is_runnable(&self) -> bool {
        VALID_STATUS_TO_RUN.contains(&self.status)
    }

    /// Returns the recurrence period for a scheduled job.
    pub fn schedule_period(&self) -> Duration {
        self.schedule_unit.to_duration(self.schedule_interval)
    }
}

/// Job workload classification, used to pick the worker pool for async runs.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum JobCategory {
    /// I/O-bound work (network calls, file access).
    Io,
    /// Compute-bound work.
    Cpu,
}

impl std::fmt::Display for JobCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io => write!(f, "IO"),
            Self::Cpu => write!(f, "CPU"),
        }
    }
}

/// Lifecycle status of a persisted job.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    Initial,
    Ready,
    Active,
    Paused,
    Archived,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "Initial"),
            Self::Ready => write!(f, "Ready"),
            Self::Active => write!(f, "Active"),
            Self::Paused => write!(f, "Paused"),
            Self::Archived => write!(f, "Archived"),
        }
    }
}

/// Unit for a job's recurrence interval.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ScheduleUnit {
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl ScheduleUnit {
    /// Converts an interval expressed in this unit to a [`Duration`].
    pub fn to_duration(self, interval: u64) -> Duration {
        let secs = match self {
            Self::Seconds => interval,
            Self::Minutes => interval * 60,
            Self::Hours => interval * 3600,
            Self::Days => interval * 86_400,
        };
        Duration::from_secs(secs)
    }
}

impl std::fmt::Display for ScheduleUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seconds => write!(f, "Seconds"),
            Self::Minutes => write!(f, "Minutes"),
            Self::Hours => write!(f, "Hours"),
            Self::Days => write!(f, "Days"),
        }
    }
}

/// Where a job's script output is routed after each run.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum OutputTarget {
    /// Log the result.
    Console,
    /// Publish the result through the configured metric sink.
    Metric,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_defaults() {
        let job = Job::new("backup", "action-1");
        assert_eq!(job.name, "backup");
        assert_eq!(job.action_id, "action-1");
        assert!(!job.is_async);
        assert!(!job.is_scheduled);
        assert!(job.is_runnable());
        assert!(!job.id.is_empty());
    }

    #[test]
    fn test_runnable_statuses() {
        let mut job = Job::new("j", "a");
        job.status = JobStatus::Ready;
        assert!(job.is_runnable());
        job.status = JobStatus::Active;
        assert!(job.is_runnable());
        job.status = JobStatus::Paused;
        assert!(!job.is_runnable());
        job.status = JobStatus::Archived;
        assert!(!job.is_runnable());
        job.status = JobStatus::Initial;
        assert!(!job.is_runnable());
    }

    #[test]
    fn test_schedule_unit_to_duration() {
        assert_eq!(ScheduleUnit::Seconds.to_duration(5), Duration::from_secs(5));
        assert_eq!(ScheduleUnit::Minutes.to_duration(2), Duration::from_secs(120));
        assert_eq!(ScheduleUnit::Hours.to_duration(1), Duration::from_secs(3600));
        assert_eq!(ScheduleUnit::Days.to_duration(1), Duration::from_secs(86_400));
    }

    #[test]
    fn test_schedule_period() {
        let mut job = Job::new("tick", "a");
        job.is_scheduled = true;
        job.schedule_interval = 30;
        job.schedule_unit = ScheduleUnit::Seconds;
        assert_eq!(job.schedule_period(), Duration::from_secs(30));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(format!("{}", JobCategory::Io), "IO");
        assert_eq!(format!("{}", JobCategory::Cpu), "CPU");
    }
}
