//! The [`Validator`] trait pipeline stages implement, and the per-stage
//! result the engine aggregates.

use crate::context::ValidationContext;
use crate::model::Decision;
use crate::value::Value;

/// What one validator decided about the call it inspected.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub decision: Decision,
    pub reason: Option<String>,
    /// Replacement arguments when `decision` is [`Decision::Modify`];
    /// every later validator sees these instead of the originals.
    pub modified_arguments: Option<Value>,
    pub metadata: ResultMetadata,
}

/// Bookkeeping the engine uses to build fine-grained trace entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultMetadata {
    /// Rule ids that matched: one trace entry is emitted per id.
    pub matched_rules: Vec<String>,
    /// Argument paths the validator inspected (without the `arguments.`
    /// prefix); one trace entry per field when no rules matched.
    pub checked_fields: Vec<String>,
    /// A single path overriding the default trace-entry path.
    pub field_path: Option<String>,
}

impl ValidationResult {
    pub fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            reason: None,
            modified_arguments: None,
            metadata: ResultMetadata::default(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Deny,
            reason: Some(reason.into()),
            modified_arguments: None,
            metadata: ResultMetadata::default(),
        }
    }

    pub fn modify(arguments: Value, reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Modify,
            reason: Some(reason.into()),
            modified_arguments: Some(arguments),
            metadata: ResultMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ResultMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Static registration metadata: priority ordering with
/// registration-order tiebreak, and an optional tool filter.
#[derive(Debug, Clone)]
pub struct ValidatorMetadata {
    pub name: String,
    pub description: Option<String>,
    /// Lower priority values run earlier. Defaults to 100.
    pub priority: i32,
    /// Tools this validator applies to; empty means all tools.
    pub tool_filter: Vec<String>,
}

pub const DEFAULT_PRIORITY: i32 = 100;

impl ValidatorMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            priority: DEFAULT_PRIORITY,
            tool_filter: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tool_filter(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tool_filter = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn applies_to(&self, tool_name: &str) -> bool {
        self.tool_filter.is_empty() || self.tool_filter.iter().any(|t| t == tool_name)
    }
}

/// One stage of the sequential pipeline.
///
/// `validate` returns `Err` when the validator itself fails (a bad regex,
/// an I/O error, a panic caught at an upstream call boundary); the engine
/// treats that as a deny, since guardrails fail closed.
pub trait Validator: Send + Sync {
    fn metadata(&self) -> ValidatorMetadata;

    fn validate(&self, ctx: &ValidationContext) -> Result<ValidationResult, String>;
}
