//! The deterministic constraint engine.
//!
//! Evaluates one [`crate::model::Condition::Field`] against an argument
//! tree. Never short-circuits: every condition in a conjunction is
//! evaluated and every failure collected, so a caller can report all
//! violations at once rather than the first one found.

use crate::error::{ConstraintError, ConstraintErrorCode};
use crate::model::Operator;
use crate::path::{self, NotFoundReason};
use crate::pattern::compile_user_pattern;
use crate::value::Value;

/// Strict mode demands identical types before comparing; coercive mode
/// converts across types first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeMode {
    #[default]
    Coercive,
    Strict,
}

/// Outcome of evaluating one condition against an argument tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstraintResult {
    pub errors: Vec<ConstraintError>,
}

impl ConstraintResult {
    pub fn pass(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Evaluate a single field condition against `root`.
pub fn evaluate_field(
    field: &str,
    operator: Operator,
    expected_json: &serde_json::Value,
    root: &Value,
    mode: TypeMode,
) -> ConstraintResult {
    let expected = Value::from_json(expected_json.clone());
    let segments = path::parse_path(field);
    let cursors = path::resolve(root, &segments);
    let wildcard = path::has_wildcard(&segments);

    if wildcard {
        return evaluate_wildcard(field, operator, &expected, &cursors, mode);
    }

    let cursor = match cursors.first() {
        Some(c) => c,
        None => {
            // Non-wildcard paths always resolve to exactly one cursor.
            return ConstraintResult {
                errors: vec![ConstraintError::new(
                    ConstraintErrorCode::PathNotFound,
                    field,
                    "a resolvable path",
                    "no value",
                    format!("path {field:?} did not resolve"),
                )],
            };
        }
    };

    if !cursor.found {
        let code = match cursor.not_found_reason {
            Some(NotFoundReason::ArrayBounds) => ConstraintErrorCode::ArrayBounds,
            _ => ConstraintErrorCode::RequiredMissing,
        };
        return ConstraintResult {
            errors: vec![ConstraintError::new(
                code,
                cursor.resolved_path.clone(),
                "field to be present",
                "missing",
                format!("field {field:?} is required but missing"),
            )],
        };
    }

    ConstraintResult {
        errors: apply_operator(&cursor.resolved_path, &cursor.value, operator, &expected, mode)
            .into_iter()
            .collect(),
    }
}

fn evaluate_wildcard(
    field: &str,
    operator: Operator,
    expected: &Value,
    cursors: &[path::Cursor],
    mode: TypeMode,
) -> ConstraintResult {
    if cursors.is_empty() {
        // Wildcard over an empty array: vacuously true (for-all over
        // nothing).
        return ConstraintResult::default();
    }

    if cursors
        .iter()
        .any(|c| c.not_found_reason == Some(NotFoundReason::WildcardOnNonArray))
    {
        return ConstraintResult {
            errors: vec![ConstraintError::new(
                ConstraintErrorCode::TypeMismatch,
                field,
                "array",
                "non-array value at a wildcard segment",
                format!("{field:?} applies [*] to a non-array value"),
            )],
        };
    }

    if cursors.iter().all(|c| !c.found) {
        // Every cursor failed because a prefix segment was missing.
        return ConstraintResult {
            errors: vec![ConstraintError::new(
                ConstraintErrorCode::PathNotFound,
                field,
                "a resolvable path",
                "missing prefix",
                format!("path {field:?} did not resolve: missing prefix"),
            )],
        };
    }

    let mut errors = Vec::new();
    for cursor in cursors {
        if !cursor.found {
            errors.push(ConstraintError::new(
                ConstraintErrorCode::RequiredMissing,
                cursor.resolved_path.clone(),
                "field to be present",
                "missing",
                format!("field {:?} is required but missing", cursor.resolved_path),
            ));
            continue;
        }
        if let Some(e) = apply_operator(&cursor.resolved_path, &cursor.value, operator, expected, mode) {
            errors.push(e);
        }
    }
    ConstraintResult { errors }
}

fn apply_operator(
    path: &str,
    actual: &Value,
    operator: Operator,
    expected: &Value,
    mode: TypeMode,
) -> Option<ConstraintError> {
    match operator {
        Operator::Equals => equals_like(path, actual, expected, mode, false),
        Operator::NotEquals => equals_like(path, actual, expected, mode, true),
        Operator::Contains => contains_like(path, actual, expected, mode, ContainsKind::Contains, false),
        Operator::NotContains => {
            contains_like(path, actual, expected, mode, ContainsKind::Contains, true)
        }
        Operator::StartsWith => {
            contains_like(path, actual, expected, mode, ContainsKind::StartsWith, false)
        }
        Operator::EndsWith => contains_like(path, actual, expected, mode, ContainsKind::EndsWith, false),
        Operator::Matches => matches_op(path, actual, expected, mode),
        Operator::GreaterThan => ordering_op(path, actual, expected, mode, true),
        Operator::LessThan => ordering_op(path, actual, expected, mode, false),
        Operator::In => membership_op(path, actual, expected, mode, false),
        Operator::NotIn => membership_op(path, actual, expected, mode, true),
    }
}

fn equals_like(
    path: &str,
    actual: &Value,
    expected: &Value,
    mode: TypeMode,
    negate: bool,
) -> Option<ConstraintError> {
    let eq = match mode {
        TypeMode::Strict => {
            if actual.type_name() != expected.type_name() {
                return Some(ConstraintError::new(
                    ConstraintErrorCode::TypeMismatch,
                    path,
                    expected.type_name(),
                    actual.type_name(),
                    format!("expected type {} got {}", expected.type_name(), actual.type_name()),
                ));
            }
            actual == expected
        }
        TypeMode::Coercive => actual.loose_eq(expected),
    };
    let matches = if negate { !eq } else { eq };
    if matches {
        None
    } else {
        Some(ConstraintError::new(
            ConstraintErrorCode::EnumViolation,
            path,
            format!("{}{}", if negate { "not " } else { "" }, expected),
            actual.to_string(),
            format!("value {actual} did not satisfy {:?} {}", if negate { "not_equals" } else { "equals" }, expected),
        ))
    }
}

enum ContainsKind {
    Contains,
    StartsWith,
    EndsWith,
}

fn contains_like(
    path: &str,
    actual: &Value,
    expected: &Value,
    mode: TypeMode,
    kind: ContainsKind,
    negate: bool,
) -> Option<ConstraintError> {
    let haystack = match mode {
        TypeMode::Strict => match actual.as_str() {
            Some(s) => s.to_string(),
            None => {
                return Some(ConstraintError::new(
                    ConstraintErrorCode::PatternMismatch,
                    path,
                    "string",
                    actual.type_name(),
                    "strict mode requires a string left-hand value".to_string(),
                ));
            }
        },
        TypeMode::Coercive => actual.coerce_to_string(),
    };
    let needle = expected.coerce_to_string();
    let hit = match kind {
        ContainsKind::Contains => haystack.contains(&needle),
        ContainsKind::StartsWith => haystack.starts_with(&needle),
        ContainsKind::EndsWith => haystack.ends_with(&needle),
    };
    let matches = if negate { !hit } else { hit };
    if matches {
        None
    } else {
        Some(ConstraintError::new(
            ConstraintErrorCode::PatternMismatch,
            path,
            needle,
            haystack,
            "value did not satisfy the pattern condition".to_string(),
        ))
    }
}

fn matches_op(path: &str, actual: &Value, expected: &Value, mode: TypeMode) -> Option<ConstraintError> {
    let pattern = expected.coerce_to_string();
    let re = match compile_user_pattern(&pattern) {
        Ok(re) => re,
        Err(reason) => {
            return Some(ConstraintError::new(
                ConstraintErrorCode::PatternMismatch,
                path,
                "a valid regular expression",
                pattern,
                reason,
            ));
        }
    };
    let subject = match mode {
        TypeMode::Strict => match actual.as_str() {
            Some(s) => s.to_string(),
            None => {
                return Some(ConstraintError::new(
                    ConstraintErrorCode::PatternMismatch,
                    path,
                    "string",
                    actual.type_name(),
                    "strict mode requires a string left-hand value".to_string(),
                ));
            }
        },
        TypeMode::Coercive => actual.coerce_to_string(),
    };
    if re.is_match(&subject) {
        None
    } else {
        Some(ConstraintError::new(
            ConstraintErrorCode::PatternMismatch,
            path,
            format!("/{pattern}/"),
            subject,
            "value did not match the pattern".to_string(),
        ))
    }
}

fn ordering_op(
    path: &str,
    actual: &Value,
    expected: &Value,
    mode: TypeMode,
    greater: bool,
) -> Option<ConstraintError> {
    let (a, b) = match mode {
        TypeMode::Strict => match (actual.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Some(ConstraintError::new(
                    ConstraintErrorCode::TypeMismatch,
                    path,
                    "number",
                    actual.type_name(),
                    "strict mode requires numeric operands".to_string(),
                ));
            }
        },
        TypeMode::Coercive => match (actual.coerce_to_f64(), expected.coerce_to_f64()) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Some(ConstraintError::new(
                    ConstraintErrorCode::TypeMismatch,
                    path,
                    "number",
                    actual.type_name(),
                    "value could not be coerced to a number".to_string(),
                ));
            }
        },
    };
    let ok = if greater { a > b } else { a < b };
    if ok {
        None
    } else {
        Some(ConstraintError::new(
            ConstraintErrorCode::ValueOutOfRange,
            path,
            format!("{} {}", if greater { ">" } else { "<" }, b),
            a.to_string(),
            format!("{a} does not satisfy {} {}", if greater { ">" } else { "<" }, b),
        ))
    }
}

fn membership_op(
    path: &str,
    actual: &Value,
    expected: &Value,
    mode: TypeMode,
    negate: bool,
) -> Option<ConstraintError> {
    let list = match expected.as_array() {
        Some(l) => l,
        None => {
            return Some(ConstraintError::new(
                ConstraintErrorCode::TypeMismatch,
                path,
                "array",
                expected.type_name(),
                "in/not_in requires an array value".to_string(),
            ));
        }
    };
    let member = list.iter().any(|v| match mode {
        TypeMode::Strict => v == actual,
        TypeMode::Coercive => v.loose_eq(actual),
    });
    let matches = if negate { !member } else { member };
    if matches {
        None
    } else {
        Some(ConstraintError::new(
            ConstraintErrorCode::EnumViolation,
            path,
            format!("{}in {}", if negate { "not " } else { "" }, expected),
            actual.to_string(),
            "membership condition not satisfied".to_string(),
        ))
    }
}
