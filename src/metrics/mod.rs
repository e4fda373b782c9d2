//! Metric emission collaborator interface.
//!
//! Jobs whose output targets include `Metric` publish their script output
//! through a [`MetricSink`]. The engine needs three primitives: set a named
//! metric, remove one, and enumerate names under a prefix (so that stale
//! keys from a previous dictionary-shaped result can be reset to `"0"`
//! before new values are written).

use dashmap::DashMap;
use tracing::debug;

/// Destination for job-produced metric values.
///
/// All methods are fire-and-forget from the engine's point of view; a sink
/// that drops values must not fail the job run.
pub trait MetricSink: Send + Sync {
    fn set_metric(&self, name: &str, value: &str);

    fn remove_metric(&self, key: &str);

    /// Returns every metric name starting with `prefix`.
    fn names_with_prefix(&self, prefix: &str) -> Vec<String>;
}

/// Sink that retains the latest value per metric name in memory.
#[derive(Default)]
pub struct InMemoryMetricSink {
    values: DashMap<String, String>,
}

impl InMemoryMetricSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value for a metric, if set.
    pub fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).map(|v| v.clone())
    }

    /// Number of retained metrics.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl MetricSink for InMemoryMetricSink {
    fn set_metric(&self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    fn remove_metric(&self, key: &str) {
        self.values.remove(key);
    }

    fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.values
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect()
    }
}

/// Sink that discards every metric.
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn set_metric(&self, _name: &str, _value: &str) {}

    fn remove_metric(&self, _key: &str) {}

    fn names_with_prefix(&self, _prefix: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Sink that logs metric updates via `tracing` at debug level.
pub struct TracingMetricSink;

impl MetricSink for TracingMetricSink {
    fn set_metric(&self, name: &str, value: &str) {
        debug!(metric = %name, value = %value, "metric set");
    }

    fn remove_metric(&self, key: &str) {
        debug!(metric = %key, "metric removed");
    }

    fn names_with_prefix(&self, _prefix: &str) -> Vec<String> {
        Vec::new()
    }
}
