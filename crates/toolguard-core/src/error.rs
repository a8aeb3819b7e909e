//! Stable error taxonomy for the constraint and expression engines.
//!
//! Constraint errors are data, not exceptions: the deterministic constraint
//! engine (`constraint` module) never returns `Result` from its evaluation
//! entry point; it accumulates [`ConstraintError`] values into a
//! [`crate::constraint::ConstraintResult`]. Error *codes* are part of the
//! public contract and must stay stable across versions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable constraint error codes.
///
/// These identifiers are serialized into traces and consumed by downstream
/// tooling; renaming a variant is a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintErrorCode {
    TypeMismatch,
    ValueOutOfRange,
    PatternMismatch,
    RequiredMissing,
    PathNotFound,
    ArrayBounds,
    EnumViolation,
}

impl fmt::Display for ConstraintErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::ValueOutOfRange => "VALUE_OUT_OF_RANGE",
            Self::PatternMismatch => "PATTERN_MISMATCH",
            Self::RequiredMissing => "REQUIRED_MISSING",
            Self::PathNotFound => "PATH_NOT_FOUND",
            Self::ArrayBounds => "ARRAY_BOUNDS",
            Self::EnumViolation => "ENUM_VIOLATION",
        };
        f.write_str(s)
    }
}

/// One constraint evaluation failure, carrying enough context for both a
/// human-readable trace entry and a programmatic redaction pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintError {
    pub code: ConstraintErrorCode,
    /// The resolved argument path this error applies to (e.g. `items[1].price`).
    pub path: String,
    /// Human-readable description of what was expected.
    pub expected: String,
    /// Human-readable description of what was found.
    pub actual: String,
    pub message: String,
}

impl ConstraintError {
    pub fn new(
        code: ConstraintErrorCode,
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
            message: message.into(),
        }
    }
}

/// Expression compiler/evaluator errors.
///
/// Both variants are recoverable above the component boundary: a validator
/// that compiles or evaluates an expression treats either as a reason to
/// deny (fail-closed) rather than propagating a panic.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("lex error at byte {position}: {message}")]
    Lexer { position: usize, message: String },

    #[error("parse error at byte {position}: {message}")]
    Parser { position: usize, message: String },

    #[error("evaluation error: {0}")]
    Evaluation(String),
}

impl ExpressionError {
    pub fn lexer(position: usize, message: impl Into<String>) -> Self {
        Self::Lexer {
            position,
            message: message.into(),
        }
    }

    pub fn parser(position: usize, message: impl Into<String>) -> Self {
        Self::Parser {
            position,
            message: message.into(),
        }
    }

    pub fn eval(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }
}
