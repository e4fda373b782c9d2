//! Integration tests for the dispatch engine.
//!
//! Exercises the full path from coordinator through dispatcher, pools,
//! timers and the run body down to the stores, with the in-memory
//! collaborators standing in for a real database, script runtime and
//! metric backend.

use actionflow::engine::{
    status_callback, ActionExecutionContext, ActionStatsStore, BulkExecutionCoordinator,
    DispatchOutcome, EngineConfig, JobDispatcher, PoolKind,
};
use actionflow::metrics::{InMemoryMetricSink, MetricSink};
use actionflow::model::{
    Action, ExecutionStatus, Job, JobCategory, JobState, JobStatus, OutputTarget, ScheduleUnit,
};
use actionflow::script::{ConfigMap, OutputData, ScriptEngine, ScriptOutcome};
use actionflow::store::{InMemoryJobStore, JobStore};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Test helpers
// ============================================================================

/// Script engine with programmable per-content behavior.
struct StubScriptEngine {
    /// Content values that fail with an exception.
    failing: Vec<String>,
    /// Dictionary output returned for contents listed here.
    dict_output: Option<BTreeMap<String, String>>,
    executions: AtomicUsize,
}

impl StubScriptEngine {
    fn succeeding() -> Self {
        Self {
            failing: Vec::new(),
            dict_output: None,
            executions: AtomicUsize::new(0),
        }
    }

    fn failing_on(content: &str) -> Self {
        Self {
            failing: vec![content.to_string()],
            dict_output: None,
            executions: AtomicUsize::new(0),
        }
    }

    fn with_dict(entries: BTreeMap<String, String>) -> Self {
        Self {
            failing: Vec::new(),
            dict_output: Some(entries),
            executions: AtomicUsize::new(0),
        }
    }

    fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

impl ScriptEngine for StubScriptEngine {
    fn execute(&self, content: &str, _config: &ConfigMap) -> ScriptOutcome {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|f| f == content) {
            return ScriptOutcome::failure(format!("script error in '{content}'"));
        }
        match &self.dict_output {
            Some(entries) => ScriptOutcome::success(OutputData::Dict(entries.clone())),
            None => ScriptOutcome::success(OutputData::Value(content.to_string())),
        }
    }
}

struct Harness {
    coordinator: BulkExecutionCoordinator,
    store: Arc<InMemoryJobStore>,
    metrics: Arc<InMemoryMetricSink>,
    script: Arc<StubScriptEngine>,
}

impl Harness {
    fn new(script: StubScriptEngine) -> Self {
        Self::with_config(
            script,
            EngineConfig::default().with_initial_schedule_delay(Duration::from_millis(10)),
        )
    }

    fn with_config(script: StubScriptEngine, config: EngineConfig) -> Self {
        let store = Arc::new(InMemoryJobStore::new());
        let metrics = Arc::new(InMemoryMetricSink::new());
        let script = Arc::new(script);
        let lock_timeout = config.lock_timeout;
        let dispatcher = Arc::new(JobDispatcher::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::clone(&script) as Arc<dyn ScriptEngine>,
            Arc::clone(&metrics) as Arc<dyn MetricSink>,
            config,
        ));
        let stats = Arc::new(ActionStatsStore::new(lock_timeout));
        Self {
            coordinator: BulkExecutionCoordinator::new(dispatcher, stats),
            store,
            metrics,
            script,
        }
    }

    async fn seed_action_with_job(&self, configure: impl FnOnce(&mut Job)) -> (Action, Job, String) {
        let action = Action::new("integration-action");
        self.coordinator.register_action(&action).unwrap();

        let mut job = Job::new("integration-job", &action.id);
        configure(&mut job);
        let result = self.coordinator.initialize_job(&job).await.unwrap();
        (action, job, result.id)
    }

    fn context(&self, action: &Action, job: &Job, result_id: &str) -> ActionExecutionContext {
        ActionExecutionContext::new(action.clone())
            .with_pair(&job.id, result_id)
            .with_callback(self.coordinator.stats_callback(&action.id))
    }
}

async fn wait_for<F>(mut condition: F, max_wait: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + max_wait;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    true
}

// ============================================================================
// Inline execution
// ============================================================================

#[tokio::test]
async fn inline_job_completes_and_reports_first_transition() {
    let harness = Harness::new(StubScriptEngine::succeeding());
    let (action, job, result_id) = harness
        .seed_action_with_job(|job| {
            job.content = "check-disk".into();
        })
        .await;

    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let ctx = harness
        .context(&action, &job, &result_id)
        .with_callback(status_callback(move |prev, next| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push((prev, next));
            }
        }));

    let report = harness.coordinator.run(&ctx).await;
    assert!(report.is_clean());
    assert_eq!(report.dispatched[0].1, DispatchOutcome::RanInline);

    // First ever completion reports prev = None.
    let calls = observed.lock().unwrap().clone();
    assert_eq!(calls, vec![(None, ExecutionStatus::Success)]);

    let result = harness.store.find_job_result(&result_id).unwrap().unwrap();
    assert_eq!(result.state, JobState::Completed);
    assert_eq!(result.status, ExecutionStatus::Success);
    assert!(result.started_at > 0);
    assert!(result.ended_at >= result.started_at);
    assert!(result.failure_notes.is_none());
}

#[tokio::test]
async fn second_run_reports_previous_terminal_status() {
    let harness = Harness::new(StubScriptEngine::succeeding());
    let (action, job, result_id) = harness.seed_action_with_job(|_| {}).await;

    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let ctx = harness
        .context(&action, &job, &result_id)
        .with_callback(status_callback(move |prev, next| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push((prev, next));
            }
        }));

    harness.coordinator.run(&ctx).await;
    harness.coordinator.run(&ctx).await;

    let calls = observed.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            (None, ExecutionStatus::Success),
            (Some(ExecutionStatus::Success), ExecutionStatus::Success),
        ]
    );
}

#[tokio::test]
async fn paused_job_is_refused_by_status_gate() {
    let harness = Harness::new(StubScriptEngine::succeeding());
    let (action, mut job, result_id) = harness.seed_action_with_job(|_| {}).await;

    job.status = JobStatus::Paused;
    harness.store.save_job(&job).unwrap();

    let ctx = harness.context(&action, &job, &result_id);
    harness.coordinator.run(&ctx).await;

    assert_eq!(harness.script.execution_count(), 0);
    let result = harness.store.find_job_result(&result_id).unwrap().unwrap();
    assert_eq!(result.state, JobState::Initial);
}

// ============================================================================
// Async execution and failure recording
// ============================================================================

#[tokio::test]
async fn async_failing_job_records_failure_notes_and_stats() {
    let harness = Harness::new(StubScriptEngine::failing_on("broken"));
    let (action, job, result_id) = harness
        .seed_action_with_job(|job| {
            job.content = "broken".into();
            job.is_async = true;
            job.category = JobCategory::Cpu;
        })
        .await;

    let ctx = harness.context(&action, &job, &result_id);
    let report = harness.coordinator.run(&ctx).await;
    assert_eq!(report.dispatched[0].1, DispatchOutcome::Submitted(PoolKind::Cpu));

    let store = Arc::clone(&harness.store);
    let rid = result_id.clone();
    assert!(
        wait_for(
            move || {
                store
                    .find_job_result(&rid)
                    .unwrap()
                    .map(|r| r.state == JobState::Completed)
                    .unwrap_or(false)
            },
            Duration::from_secs(2),
        )
        .await
    );

    let result = harness.store.find_job_result(&result_id).unwrap().unwrap();
    assert_eq!(result.status, ExecutionStatus::Failure);
    assert_eq!(
        result.failure_notes.as_deref(),
        Some("script error in 'broken'")
    );

    let stats = Arc::clone(harness.coordinator.stats());
    let action_id = action.id.clone();
    assert!(
        wait_for(
            move || stats
                .get(&action_id)
                .map(|s| s.number_of_failure_jobs == 1)
                .unwrap_or(false),
            Duration::from_secs(2),
        )
        .await
    );
}

#[tokio::test]
async fn concurrent_completions_are_not_lost() {
    let harness = Harness::new(StubScriptEngine::succeeding());
    let action = Action::new("many-jobs");
    harness.coordinator.register_action(&action).unwrap();

    let mut ctx = ActionExecutionContext::new(action.clone())
        .with_callback(harness.coordinator.stats_callback(&action.id));
    let total = 20;
    for i in 0..total {
        let mut job = Job::new(format!("job-{i}"), &action.id);
        job.is_async = true;
        let result = harness.coordinator.initialize_job(&job).await.unwrap();
        ctx = ctx.with_pair(&job.id, &result.id);
    }

    let report = harness.coordinator.run(&ctx).await;
    assert!(report.is_clean());

    let stats = Arc::clone(harness.coordinator.stats());
    let action_id = action.id.clone();
    assert!(
        wait_for(
            move || stats
                .get(&action_id)
                .map(|s| s.number_of_success_jobs == total)
                .unwrap_or(false),
            Duration::from_secs(5),
        )
        .await,
        "every completion must reach the counters"
    );
}

// ============================================================================
// Scheduled execution
// ============================================================================

#[tokio::test]
async fn scheduled_job_ticks_and_feeds_stats() {
    let harness = Harness::new(StubScriptEngine::succeeding());
    let (action, job, result_id) = harness
        .seed_action_with_job(|job| {
            job.is_scheduled = true;
            job.schedule_interval = 1;
            job.schedule_unit = ScheduleUnit::Seconds;
        })
        .await;

    let ctx = harness.context(&action, &job, &result_id);
    let report = harness.coordinator.run(&ctx).await;
    assert_eq!(report.dispatched[0].1, DispatchOutcome::Scheduled);

    let stats = Arc::clone(harness.coordinator.stats());
    let action_id = action.id.clone();
    assert!(
        wait_for(
            move || stats
                .get(&action_id)
                .map(|s| s.number_of_success_jobs >= 1)
                .unwrap_or(false),
            Duration::from_secs(3),
        )
        .await
    );

    let result = harness.store.find_job_result(&result_id).unwrap().unwrap();
    assert_eq!(result.state, JobState::Completed);

    harness.coordinator.dispatcher().registry().cancel_all();
}

#[tokio::test]
async fn duplicate_registration_replaces_previous_timer() {
    let harness = Harness::new(StubScriptEngine::succeeding());
    let (action, job, result_id) = harness
        .seed_action_with_job(|job| {
            job.is_scheduled = true;
            job.schedule_interval = 3600;
        })
        .await;

    let ctx = harness.context(&action, &job, &result_id);
    harness.coordinator.run(&ctx).await;
    harness.coordinator.run(&ctx).await;

    let registry = harness.coordinator.dispatcher().registry();
    assert_eq!(registry.len(), 1);
    assert!(registry.contains(&job.id));

    registry.cancel_all();
}

#[tokio::test]
async fn relay_execution_bypasses_timer_registration() {
    let harness = Harness::new(StubScriptEngine::succeeding());
    let (action, job, result_id) = harness
        .seed_action_with_job(|job| {
            job.is_scheduled = true;
            job.schedule_interval = 3600;
        })
        .await;

    let ctx = harness.context(&action, &job, &result_id).as_relay();
    let report = harness.coordinator.run(&ctx).await;
    assert_eq!(report.dispatched[0].1, DispatchOutcome::Submitted(PoolKind::Io));
    assert!(!harness.coordinator.dispatcher().registry().contains(&job.id));
}

#[tokio::test]
async fn schedule_capacity_exhaustion_is_reported() {
    let config = EngineConfig::default()
        .with_schedule_pool_size(1)
        .with_initial_schedule_delay(Duration::from_millis(10));
    let harness = Harness::with_config(StubScriptEngine::succeeding(), config);

    let (action, first, first_result) = harness
        .seed_action_with_job(|job| {
            job.is_scheduled = true;
            job.schedule_interval = 3600;
        })
        .await;
    let ctx = harness.context(&action, &first, &first_result);
    assert_eq!(
        harness.coordinator.run(&ctx).await.dispatched[0].1,
        DispatchOutcome::Scheduled
    );

    let mut second = Job::new("overflow", &action.id);
    second.is_scheduled = true;
    second.schedule_interval = 3600;
    let second_result = harness.coordinator.initialize_job(&second).await.unwrap();
    let ctx = harness.context(&action, &second, &second_result.id);
    assert_eq!(
        harness.coordinator.run(&ctx).await.dispatched[0].1,
        DispatchOutcome::ScheduleCapacityExhausted
    );

    harness.coordinator.dispatcher().registry().cancel_all();
}

#[tokio::test]
async fn pausing_a_scheduled_job_stops_future_ticks() {
    let harness = Harness::new(StubScriptEngine::succeeding());
    let (action, job, result_id) = harness
        .seed_action_with_job(|job| {
            job.is_scheduled = true;
            job.schedule_interval = 1;
        })
        .await;

    let ctx = harness.context(&action, &job, &result_id);
    harness.coordinator.run(&ctx).await;

    let script = Arc::clone(&harness.script);
    assert!(wait_for(move || script.execution_count() >= 1, Duration::from_secs(3)).await);

    harness.coordinator.dispatcher().pause_job(&job.id).unwrap();
    assert!(!harness.coordinator.dispatcher().registry().contains(&job.id));

    let after_pause = harness.script.execution_count();
    tokio::time::sleep(Duration::from_millis(1200)).await;
    // One in-flight tick may still land; nothing new starts after that.
    assert!(harness.script.execution_count() <= after_pause + 1);
}

// ============================================================================
// Output routing
// ============================================================================

#[tokio::test]
async fn dict_output_publishes_and_resets_metrics() {
    let mut first = BTreeMap::new();
    first.insert("errors".to_string(), "3".to_string());
    first.insert("warnings".to_string(), "9".to_string());

    let harness = Harness::new(StubScriptEngine::with_dict(first));
    let (action, job, result_id) = harness
        .seed_action_with_job(|job| {
            job.name = "log-scan".into();
            job.output_targets = vec![OutputTarget::Console, OutputTarget::Metric];
        })
        .await;

    let ctx = harness.context(&action, &job, &result_id);
    harness.coordinator.run(&ctx).await;

    assert_eq!(
        harness.metrics.get("job-manager-for-log-scan-errors").as_deref(),
        Some("3")
    );
    assert_eq!(
        harness.metrics.get("job-manager-for-log-scan-warnings").as_deref(),
        Some("9")
    );
}

#[tokio::test]
async fn console_only_job_publishes_no_metrics() {
    let harness = Harness::new(StubScriptEngine::succeeding());
    let (action, job, result_id) = harness
        .seed_action_with_job(|job| {
            job.output_targets = vec![OutputTarget::Console];
        })
        .await;

    let ctx = harness.context(&action, &job, &result_id);
    harness.coordinator.run(&ctx).await;
    assert!(harness.metrics.is_empty());
}

// ============================================================================
// Startup restore
// ============================================================================

#[tokio::test]
async fn restore_scheduled_jobs_reregisters_active_timers() {
    let harness = Harness::new(StubScriptEngine::succeeding());

    let action = Action::new("survivor");
    harness.store.save_action(&action).unwrap();
    let mut job = Job::new("tick", &action.id);
    job.is_scheduled = true;
    job.schedule_interval = 3600;
    harness.store.save_job(&job).unwrap();
    harness
        .store
        .save_job_result(&actionflow::model::JobResult::pending(&job.id, &action.id))
        .unwrap();

    let registered = harness.coordinator.restore_scheduled_jobs().await.unwrap();
    assert_eq!(registered, 1);
    assert!(harness.coordinator.dispatcher().registry().contains(&job.id));

    let snap = harness.coordinator.stats().get(&action.id).unwrap();
    assert_eq!(snap.number_of_schedule_jobs, 1);

    harness.coordinator.dispatcher().registry().cancel_all();
}
