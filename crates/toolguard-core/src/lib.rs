//! # toolguard-core
//!
//! Deterministic guardrail engine for AI-agent tool calls: a constraint
//! engine, a boolean expression compiler/evaluator, a rule model, and the
//! sequential validator pipeline that ties them together.
//!
//! ## Stability tiers
//!
//! - **Stable** -- `model`, `value`, `error`, `context`, `config`.
//!   These follow semver: breaking changes require a major version bump.
//! - **Unstable** -- `constraint`, `expr`, `validator`, `engine`,
//!   `rule_validator`, `rule_match`, `rules_index`, `rate_limit`.
//!   Interfaces may change on minor releases as the engine matures.
//! - **Internal** -- `path`, `pattern` (`pub(crate)`).
//!   Not part of the public API; reused across `constraint` and `expr`.

/// Rule, condition, and rule-set types.
///
/// **Stability: stable**.
pub mod model;
/// The argument-tree value type shared by the constraint engine and the
/// expression evaluator.
///
/// **Stability: stable**.
pub mod value;
/// Stable error codes and expression error types.
///
/// **Stability: stable**.
pub mod error;
/// Validation context, explanation trace, and result types.
///
/// **Stability: stable**.
pub mod context;
/// Runtime configuration and its builder.
///
/// **Stability: stable**.
pub mod config;

/// Path parsing and cursor resolution shared by `constraint` and `expr`.
pub(crate) mod path;
/// Bounded, cached compilation of user-supplied `matches` patterns.
pub(crate) mod pattern;

/// The deterministic constraint engine.
///
/// **Stability: unstable**.
pub mod constraint;
/// The boolean expression compiler and evaluator.
///
/// **Stability: unstable**.
pub mod expr;
/// Combines `constraint` and `expr` to decide whether a rule matches.
///
/// **Stability: unstable**.
pub mod rule_match;
/// Indexed, tool-keyed view over loaded rule sets.
///
/// **Stability: unstable**.
pub mod rules_index;
/// The `Validator` trait pipeline stages implement.
///
/// **Stability: unstable**.
pub mod validator;
/// The built-in rule-driven validator.
///
/// **Stability: unstable**.
pub mod rule_validator;
/// Per-tool sliding-window rate limiting.
///
/// **Stability: unstable**.
pub mod rate_limit;
/// The sequential pipeline engine.
///
/// **Stability: unstable**.
pub mod engine;

pub use config::{GuardrailConfig, GuardrailConfigBuilder};
pub use constraint::{ConstraintResult, TypeMode};
pub use context::{
    AggregatedValidationResult, Explanation, ExplanationConfig, ExplanationVerbosity,
    HistoricalCall, TraceEntry, TraceOutcome, ValidationContext,
};
pub use engine::{CancelToken, Engine, REDACTED};
pub use error::{ConstraintError, ConstraintErrorCode, ExpressionError};
pub use expr::{CompiledExpression, EvalContext};
pub use model::{Action, Condition, Conjunction, Decision, Operator, Rule, RuleSet, Severity};
pub use rule_validator::RuleValidator;
pub use rules_index::LoadedRules;
pub use validator::{ResultMetadata, ValidationResult, Validator, ValidatorMetadata};
pub use value::Value;
