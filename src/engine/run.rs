//! The guarded run body shared by every execution path.
//!
//! Inline runs, pool submissions and scheduled ticks all funnel through
//! [`run_job_guarded`]. The body owns the full persistence cycle of one
//! run: status gate, per-job execution lock, `Processing` persist, script
//! execution against the merged configuration, output routing, terminal
//! persist and the status-change callback. Every failure inside the body is
//! recorded on the job result or logged; nothing propagates to the caller,
//! so a failing run can never take down a worker or a timer.

use super::context::StatusChangeCallback;
use super::execution_lock::JobExecutionLock;
use crate::metrics::MetricSink;
use crate::model::{Action, ExecutionStatus, Job, JobResult, JobState, OutputTarget};
use crate::script::{ConfigMap, OutputData, ScriptEngine, ScriptOutcome};
use crate::store::JobStore;
use crate::time::epoch_millis;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Prefix for every metric published on behalf of a job.
pub const METRIC_PREFIX: &str = "job-manager-for-";

/// Returns the metric name prefix for a job.
pub fn metric_prefix(job_name: &str) -> String {
    format!("{METRIC_PREFIX}{job_name}")
}

/// Merges the action's configuration with the job's, job keys winning.
///
/// Both inputs must be JSON objects; anything else is a configuration
/// error that fails the run before the script executes.
pub(crate) fn merge_configurations(
    action_configuration: &str,
    job_configurations: &str,
) -> Result<ConfigMap, String> {
    let mut merged = parse_object(action_configuration, "action configuration")?;
    let overlay = parse_object(job_configurations, "job configurations")?;
    merged.extend(overlay);
    Ok(merged)
}

fn parse_object(raw: &str, what: &str) -> Result<ConfigMap, String> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid {what}: {e}"))?;
    match value {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(format!("invalid {what}: expected object, got {other}")),
    }
}

/// Executes one run of a job, end to end.
///
/// Skips silently (with a log line) when the job's status does not permit
/// execution or when the job's execution lock cannot be acquired within
/// its bound. Otherwise persists `Processing`, runs the script, routes the
/// output, persists the terminal result and awaits the status-change
/// callback before releasing the lock.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_job_guarded(
    store: &Arc<dyn JobStore>,
    script: &Arc<dyn ScriptEngine>,
    metrics: &Arc<dyn MetricSink>,
    execution_lock: &JobExecutionLock,
    action: &Action,
    job: &Job,
    mut result: JobResult,
    on_status_change: &StatusChangeCallback,
) {
    if !job.is_runnable() {
        error!(
            job_id = %job.id,
            job_name = %job.name,
            status = %job.status,
            "job status does not permit execution, skipping run"
        );
        return;
    }

    let Some(_guard) = execution_lock.acquire(&job.id).await else {
        info!(
            job_id = %job.id,
            job_name = %job.name,
            "job is already running, skipping this run"
        );
        return;
    };

    let prev = result.previous_status();

    // First transition into Processing stamps the start time once; later
    // runs of a recurring job keep the original start.
    let now = epoch_millis();
    if result.started_at == 0 {
        result.started_at = now;
    }
    result.status = ExecutionStatus::Processing;
    result.updated_at = now;

    // Failures anywhere in the body, persistence included, become a
    // FAILURE terminal result; the run never aborts mid-cycle.
    let outcome = match store.save_job_result(&result) {
        Ok(()) => match merge_configurations(&action.configuration, &job.configurations) {
            Ok(config) => {
                debug!(job_id = %job.id, job_name = %job.name, "executing job content");
                script.execute(&job.content, &config)
            }
            Err(e) => ScriptOutcome::failure(e),
        },
        Err(e) => {
            error!(job_id = %job.id, error = %e, "cannot persist processing state");
            ScriptOutcome::failure(format!("cannot persist processing state: {e}"))
        }
    };

    route_output(metrics, job, &outcome);

    let next = if outcome.is_failure() {
        ExecutionStatus::Failure
    } else {
        ExecutionStatus::Success
    };

    let ended = epoch_millis();
    result.state = JobState::Completed;
    result.status = next;
    result.failure_notes = outcome.exception.filter(|e| !e.is_empty());
    result.ended_at = ended;
    result.elapsed_ms = ended.saturating_sub(result.started_at);
    result.updated_at = ended;
    if let Err(e) = store.save_job_result(&result) {
        // The run itself finished; the stale record will be overwritten by
        // the next run's cycle.
        error!(job_id = %job.id, error = %e, "cannot persist terminal job result");
    }

    info!(
        job_id = %job.id,
        job_name = %job.name,
        status = %next,
        elapsed_ms = result.elapsed_ms,
        "job run completed"
    );

    // Awaited while the execution lock is held, so callbacks for one job
    // arrive strictly in completion order.
    on_status_change(prev, next).await;
}

/// Routes script output to the job's configured targets.
fn route_output(metrics: &Arc<dyn MetricSink>, job: &Job, outcome: &ScriptOutcome) {
    for target in &job.output_targets {
        match target {
            OutputTarget::Console => {
                info!(
                    job_id = %job.id,
                    job_name = %job.name,
                    output = ?outcome.data,
                    "job output"
                );
            }
            OutputTarget::Metric => publish_metrics(metrics.as_ref(), job, &outcome.data),
        }
    }
}

/// Publishes a run's output as metrics under the job's prefix.
///
/// Dictionary output first resets every existing metric under the prefix
/// to `"0"`, so keys the script stopped producing read as zero instead of
/// a stale value.
fn publish_metrics(metrics: &dyn MetricSink, job: &Job, data: &OutputData) {
    let prefix = metric_prefix(&job.name);
    match data {
        OutputData::None => {}
        OutputData::Value(value) => {
            metrics.set_metric(&prefix, value);
        }
        OutputData::Dict(entries) => {
            for stale in metrics.names_with_prefix(&prefix) {
                metrics.set_metric(&stale, "0");
            }
            for (key, value) in entries {
                metrics.set_metric(&format!("{prefix}-{key}"), value);
            }
        }
    }
}
