//! Script/template execution collaborator interface.
//!
//! The engine treats script execution as a black box: it hands the job's
//! content plus a merged configuration map to a [`ScriptEngine`] and gets a
//! [`ScriptOutcome`] back. Failures surface as a present `exception` string
//! on the outcome, never as a panic or error the dispatcher must parse.

use std::collections::BTreeMap;

/// Configuration map passed to script execution: the owning action's
/// configuration with the job's configuration merged over it.
pub type ConfigMap = BTreeMap<String, serde_json::Value>;

/// Output produced by one script run.
#[derive(Clone, Debug, PartialEq)]
pub enum OutputData {
    /// No data produced.
    None,
    /// A single scalar value.
    Value(String),
    /// A dictionary of named values, each published as its own metric when
    /// the job's output targets include `Metric`.
    Dict(BTreeMap<String, String>),
}

/// Result of one script execution.
#[derive(Clone, Debug)]
pub struct ScriptOutcome {
    pub data: OutputData,
    /// Present when the script failed; its content becomes the job result's
    /// `failure_notes`.
    pub exception: Option<String>,
}

impl ScriptOutcome {
    /// A successful outcome carrying the given data.
    pub fn success(data: OutputData) -> Self {
        Self {
            data,
            exception: None,
        }
    }

    /// A failed outcome with the given exception message.
    pub fn failure(exception: impl Into<String>) -> Self {
        Self {
            data: OutputData::None,
            exception: Some(exception.into()),
        }
    }

    /// Returns true if the outcome carries an exception.
    pub fn is_failure(&self) -> bool {
        self.exception.as_deref().is_some_and(|e| !e.is_empty())
    }
}

/// Executes job content against a merged configuration map.
///
/// Implementations must be callable from multiple worker threads. A slow or
/// panicking engine is the implementor's problem; the dispatcher only reacts
/// to the returned outcome.
pub trait ScriptEngine: Send + Sync {
    fn execute(&self, content: &str, config: &ConfigMap) -> ScriptOutcome;
}

/// Trivial engine that echoes the job content back as a single value.
///
/// Useful for dry runs and wiring tests.
pub struct EchoScriptEngine;

impl ScriptEngine for EchoScriptEngine {
    fn execute(&self, content: &str, _config: &ConfigMap) -> ScriptOutcome {
        ScriptOutcome::success(OutputData::Value(content.to_string()))
    }
}
