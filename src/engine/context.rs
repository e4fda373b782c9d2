//! Bulk-execution request context.

use crate::model::{Action, ExecutionStatus};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Callback invoked after every completed run with the previous and new
/// execution status.
///
/// `prev` is `None` for a job's first ever completion. The run body awaits
/// the returned future before releasing the job's execution lock, so
/// callbacks for one job are delivered strictly in completion order.
pub type StatusChangeCallback = Arc<
    dyn Fn(Option<ExecutionStatus>, ExecutionStatus) -> Pin<Box<dyn Future<Output = ()> + Send>>
        + Send
        + Sync,
>;

/// Wraps an async closure into a [`StatusChangeCallback`].
pub fn status_callback<F, Fut>(callback: F) -> StatusChangeCallback
where
    F: Fn(Option<ExecutionStatus>, ExecutionStatus) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |prev, next| Box::pin(callback(prev, next)))
}

/// Returns a callback that ignores every status change.
pub fn noop_callback() -> StatusChangeCallback {
    status_callback(|_, _| async {})
}

/// Everything needed to execute a batch of jobs under one action.
///
/// `job_result_pairs` maps job id to the id of its pre-created result
/// record. Relay executions bypass the recurring-schedule registration so
/// that a scheduled job can also be triggered on demand.
#[derive(Clone)]
pub struct ActionExecutionContext {
    pub action: Action,
    pub job_result_pairs: HashMap<String, String>,
    pub on_status_change: StatusChangeCallback,
    pub is_relay_action: bool,
}

impl ActionExecutionContext {
    /// Creates a non-relay context with a no-op status callback.
    pub fn new(action: Action) -> Self {
        Self {
            action,
            job_result_pairs: HashMap::new(),
            on_status_change: noop_callback(),
            is_relay_action: false,
        }
    }

    pub fn with_pair(mut self, job_id: impl Into<String>, result_id: impl Into<String>) -> Self {
        self.job_result_pairs.insert(job_id.into(), result_id.into());
        self
    }

    pub fn with_callback(mut self, callback: StatusChangeCallback) -> Self {
        self.on_status_change = callback;
        self
    }

    pub fn as_relay(mut self) -> Self {
        self.is_relay_action = true;
        self
    }
}

impl std::fmt::Debug for ActionExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutionContext")
            .field("action_id", &self.action.id)
            .field("jobs", &self.job_result_pairs.len())
            .field("is_relay_action", &self.is_relay_action)
            .finish()
    }
}
