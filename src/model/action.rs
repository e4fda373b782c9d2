//! Action entity: a named group of jobs sharing lifecycle and statistics.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named group of jobs with a shared lifecycle (archive/restore/replay)
/// and aggregate statistics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub name: String,
    pub status: ActionStatus,
    /// JSON object with action-level configuration; job configuration is
    /// merged over it before script execution.
    pub configuration: String,
    pub created_at: u64,
}

impl Action {
    /// Creates an active action with a generated id and empty configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            status: ActionStatus::Active,
            configuration: "{}".to_string(),
            created_at: crate::time::epoch_millis(),
        }
    }
}

/// Lifecycle status of an action.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ActionStatus {
    #[default]
    Initial,
    Active,
    Paused,
    Archived,
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "Initial"),
            Self::Active => write!(f, "Active"),
            Self::Paused => write!(f, "Paused"),
            Self::Archived => write!(f, "Archived"),
        }
    }
}
