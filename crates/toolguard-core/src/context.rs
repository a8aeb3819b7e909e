//! Validation context, explanation trace, and pipeline result types.

use crate::model::Decision;
use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One previously-validated call in the same session, used by validators
/// and expressions that reason about call history. Read-only input: the
/// engine never appends to it.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalCall {
    pub tool_name: String,
    pub arguments: Value,
    pub call_id: Option<String>,
    pub decision: Decision,
    pub timestamp: DateTime<Utc>,
}

/// The evolving state a sequential validator pipeline runs over.
///
/// `arguments` may be replaced by a `modify` result between validators;
/// everything downstream sees the modified value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationContext {
    pub tool_name: String,
    pub arguments: Value,
    pub call_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub call_history: Vec<HistoricalCall>,
    pub metadata: BTreeMap<String, Value>,
}

impl ValidationContext {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            call_id: None,
            timestamp: Utc::now(),
            call_history: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    /// Build the flat object an expression evaluates against: `tool_name`,
    /// `arguments`, and `call_history_length` as top-level keys, plus any
    /// host-supplied metadata that doesn't collide with those.
    pub fn to_eval_root(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("tool_name".to_string(), Value::String(self.tool_name.clone()));
        map.insert("arguments".to_string(), self.arguments.clone());
        if let Some(id) = &self.call_id {
            map.insert("call_id".to_string(), Value::String(id.clone()));
        }
        map.insert(
            "call_history_length".to_string(),
            Value::Number(self.call_history.len() as f64),
        );
        for (k, v) in &self.metadata {
            map.entry(k.clone()).or_insert_with(|| v.clone());
        }
        Value::Object(map)
    }
}

/// Verbosity for explanation construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationVerbosity {
    /// No trace entries at all.
    #[default]
    None,
    /// Trace entries only for decision-changing validator results.
    Simple,
    /// One or more entries for every validator that ran.
    Verbose,
}

/// Controls trace construction and field redaction.
#[derive(Debug, Clone, Default)]
pub struct ExplanationConfig {
    pub verbosity: ExplanationVerbosity,
    /// Trace entries whose `path` equals one of these, or is a
    /// `.`-descendant of one, have `expected`/`actual` replaced with
    /// `"[REDACTED]"`.
    pub redact_paths: Vec<String>,
}

impl ExplanationConfig {
    pub fn is_redacted(&self, path: &str) -> bool {
        self.redact_paths
            .iter()
            .any(|prefix| path == prefix || path.starts_with(&format!("{prefix}.")))
    }
}

/// Whether a trace entry documents a check that let the call through.
/// Only `allow` counts as a pass; `deny` and `modify` are both
/// decision-changing and therefore fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceOutcome {
    Pass,
    Fail,
}

/// One entry in an explanation trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub rule_id: Option<String>,
    pub rule_name: Option<String>,
    /// What performed the check: a validator name, or `validator.error`
    /// for a validator that failed outright.
    pub constraint: String,
    /// The argument path this entry is about, e.g. `arguments.password`.
    pub path: String,
    pub expected: String,
    pub actual: String,
    pub result: TraceOutcome,
    pub message: String,
}

/// Why the pipeline decided what it decided.
///
/// Every field except `evaluation_time_ms` is deterministic for a fixed
/// (validators, context, explanation config) triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub decision: Decision,
    pub reason: String,
    pub verbosity: ExplanationVerbosity,
    pub trace: Vec<TraceEntry>,
    /// How many validators were invoked.
    pub evaluated_rules: usize,
    /// How many of those returned a decision-changing result.
    pub matched_rules: usize,
    pub evaluation_time_ms: u64,
    /// `Fix: <reason>` hints collected from deny results. Empty unless
    /// the final decision is a deny; modify results never contribute.
    pub remediation: Vec<String>,
}

/// The pipeline's aggregated outcome for one tool call.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct AggregatedValidationResult {
    pub decision: Decision,
    pub reason: Option<String>,
    /// The validator whose result decided the call, when one did.
    pub validator_name: Option<String>,
    /// Final arguments: the input ones, or the last modification when the
    /// decision is `modify`.
    pub arguments: Value,
    pub explanation: Explanation,
}

impl AggregatedValidationResult {
    pub fn allowed(&self) -> bool {
        self.decision == Decision::Allow
    }
}
