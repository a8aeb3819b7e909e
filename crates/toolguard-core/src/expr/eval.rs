//! Tree-walking evaluator for compiled expressions.

use super::ast::{BinaryOp, Expr, UnaryOp, MAX_AST_DEPTH};
use crate::error::ExpressionError;
use crate::path::{parse_path, Segment};
use crate::pattern::compile_user_pattern;
use crate::value::Value;

/// Flat evaluation context: a dotted path like `tool_name` or
/// `arguments.amount` resolves against this tree.
pub struct EvalContext {
    root: Value,
}

impl EvalContext {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// Expression path resolution is null-tolerant rather than fan-out:
    /// a field on a non-object, an index on a non-array, and a wildcard
    /// on a non-array all resolve to null, while a wildcard on an array
    /// yields the array itself so `len(items[*])` counts its elements.
    fn resolve(&self, dotted_path: &str) -> Value {
        let mut current = self.root.clone();
        for segment in parse_path(dotted_path) {
            current = match segment {
                Segment::Field(name) => match current {
                    Value::Object(map) => map.get(&name).cloned().unwrap_or(Value::Null),
                    _ => Value::Null,
                },
                Segment::Index(idx) => match current {
                    Value::Array(arr) => arr.get(idx).cloned().unwrap_or(Value::Null),
                    _ => Value::Null,
                },
                Segment::Wildcard => {
                    if matches!(current, Value::Array(_)) {
                        current
                    } else {
                        Value::Null
                    }
                }
            };
        }
        current
    }
}

pub fn eval(expr: &Expr, ctx: &EvalContext) -> Result<Value, ExpressionError> {
    if expr.depth() > MAX_AST_DEPTH {
        return Err(ExpressionError::eval(format!(
            "expression exceeds maximum nesting depth of {MAX_AST_DEPTH}"
        )));
    }
    eval_inner(expr, ctx)
}

fn eval_inner(expr: &Expr, ctx: &EvalContext) -> Result<Value, ExpressionError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Null),
        Expr::Path(p) => Ok(ctx.resolve(p)),
        Expr::Unary(op, inner) => eval_unary(*op, inner, ctx),
        Expr::Binary(op, left, right) => eval_binary(*op, left, right, ctx),
        Expr::Call(name, args) => eval_call(name, args, ctx),
    }
}

fn to_bool(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn to_number(v: &Value) -> Result<f64, ExpressionError> {
    v.coerce_to_f64()
        .ok_or_else(|| ExpressionError::eval(format!("cannot convert {} to a number", v.type_name())))
}

fn eval_unary(op: UnaryOp, inner: &Expr, ctx: &EvalContext) -> Result<Value, ExpressionError> {
    let v = eval_inner(inner, ctx)?;
    match op {
        UnaryOp::Not => Ok(Value::Bool(!to_bool(&v))),
        UnaryOp::Neg => Ok(Value::Number(-to_number(&v)?)),
    }
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, ctx: &EvalContext) -> Result<Value, ExpressionError> {
    // Short-circuit logical operators evaluate the right side lazily.
    match op {
        BinaryOp::And => {
            let l = eval_inner(left, ctx)?;
            if !to_bool(&l) {
                return Ok(Value::Bool(false));
            }
            let r = eval_inner(right, ctx)?;
            return Ok(Value::Bool(to_bool(&r)));
        }
        BinaryOp::Or => {
            let l = eval_inner(left, ctx)?;
            if to_bool(&l) {
                return Ok(Value::Bool(true));
            }
            let r = eval_inner(right, ctx)?;
            return Ok(Value::Bool(to_bool(&r)));
        }
        _ => {}
    }

    let l = eval_inner(left, ctx)?;
    let r = eval_inner(right, ctx)?;

    match op {
        BinaryOp::Eq => Ok(Value::Bool(l.loose_eq(&r))),
        BinaryOp::NotEq => Ok(Value::Bool(!l.loose_eq(&r))),
        BinaryOp::Lt => Ok(Value::Bool(to_number(&l)? < to_number(&r)?)),
        BinaryOp::LtEq => Ok(Value::Bool(to_number(&l)? <= to_number(&r)?)),
        BinaryOp::Gt => Ok(Value::Bool(to_number(&l)? > to_number(&r)?)),
        BinaryOp::GtEq => Ok(Value::Bool(to_number(&l)? >= to_number(&r)?)),
        BinaryOp::Add => {
            if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
                Ok(Value::String(format!("{}{}", l.coerce_to_string(), r.coerce_to_string())))
            } else {
                Ok(Value::Number(to_number(&l)? + to_number(&r)?))
            }
        }
        BinaryOp::Sub => Ok(Value::Number(to_number(&l)? - to_number(&r)?)),
        BinaryOp::Mul => Ok(Value::Number(to_number(&l)? * to_number(&r)?)),
        BinaryOp::Div => {
            let denom = to_number(&r)?;
            if denom == 0.0 {
                return Err(ExpressionError::eval("division by zero"));
            }
            Ok(Value::Number(to_number(&l)? / denom))
        }
        BinaryOp::In | BinaryOp::NotIn => {
            let list = r
                .as_array()
                .ok_or_else(|| ExpressionError::eval("right-hand side of in/not_in must be an array"))?;
            let member = list.iter().any(|v| v.loose_eq(&l));
            Ok(Value::Bool(if op == BinaryOp::In { member } else { !member }))
        }
        BinaryOp::Contains => match &l {
            // Array haystack: element membership. String haystack (or
            // anything stringifiable): substring.
            Value::Array(items) => Ok(Value::Bool(items.iter().any(|v| v.loose_eq(&r)))),
            _ => {
                let haystack = l.coerce_to_string();
                let needle = r.coerce_to_string();
                Ok(Value::Bool(haystack.contains(&needle)))
            }
        },
        BinaryOp::Matches => {
            let pattern = r.coerce_to_string();
            let re = compile_user_pattern(&pattern).map_err(ExpressionError::eval)?;
            Ok(Value::Bool(re.is_match(&l.coerce_to_string())))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn eval_call(name: &str, args: &[Expr], ctx: &EvalContext) -> Result<Value, ExpressionError> {
    let values = args
        .iter()
        .map(|a| eval_inner(a, ctx))
        .collect::<Result<Vec<_>, _>>()?;

    match name {
        "len" => {
            let v = arg(&values, 0, name)?;
            let n = match v {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                other => {
                    return Err(ExpressionError::eval(format!(
                        "len() does not accept {}",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Number(n as f64))
        }
        "lower" => Ok(Value::String(string_arg(&values, 0, name)?.to_lowercase())),
        "upper" => Ok(Value::String(string_arg(&values, 0, name)?.to_uppercase())),
        "abs" => Ok(Value::Number(to_number(arg(&values, 0, name)?)?.abs())),
        "min" => numeric_fold(&values, name, f64::min),
        "max" => numeric_fold(&values, name, f64::max),
        "starts_with" => Ok(Value::Bool(
            string_arg(&values, 0, name)?.starts_with(string_arg(&values, 1, name)?),
        )),
        "ends_with" => Ok(Value::Bool(
            string_arg(&values, 0, name)?.ends_with(string_arg(&values, 1, name)?),
        )),
        other => Err(ExpressionError::eval(format!("unknown function {other:?}"))),
    }
}

fn arg<'a>(values: &'a [Value], idx: usize, fn_name: &str) -> Result<&'a Value, ExpressionError> {
    values
        .get(idx)
        .ok_or_else(|| ExpressionError::eval(format!("{fn_name}() is missing argument {idx}")))
}

fn string_arg<'a>(values: &'a [Value], idx: usize, fn_name: &str) -> Result<&'a str, ExpressionError> {
    match arg(values, idx, fn_name)? {
        Value::String(s) => Ok(s.as_str()),
        other => Err(ExpressionError::eval(format!(
            "{fn_name}() expected a string argument, got {}",
            other.type_name()
        ))),
    }
}

fn numeric_fold(
    values: &[Value],
    fn_name: &str,
    fold: impl Fn(f64, f64) -> f64,
) -> Result<Value, ExpressionError> {
    if values.is_empty() {
        return Err(ExpressionError::eval(format!("{fn_name}() requires at least one argument")));
    }
    let mut acc = to_number(&values[0])?;
    for v in &values[1..] {
        acc = fold(acc, to_number(v)?);
    }
    Ok(Value::Number(acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;
    use std::collections::BTreeMap;

    fn ctx_with(pairs: &[(&str, Value)]) -> EvalContext {
        let mut map = BTreeMap::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.clone());
        }
        EvalContext::new(Value::Object(map))
    }

    fn eval_str(src: &str, ctx: &EvalContext) -> Value {
        eval(&parse(src).unwrap(), ctx).unwrap()
    }

    #[test]
    fn evaluates_comparison_against_context() {
        let ctx = ctx_with(&[("amount", Value::Number(150.0))]);
        assert_eq!(eval_str("amount > 100", &ctx), Value::Bool(true));
    }

    #[test]
    fn short_circuits_and_or() {
        let ctx = ctx_with(&[]);
        // The right side references a path that would error if forced
        // through to_number; short-circuit must skip it.
        assert_eq!(eval_str("false && (1/0 > 0)", &ctx), Value::Bool(false));
        assert_eq!(eval_str("true || (1/0 > 0)", &ctx), Value::Bool(true));
    }

    #[test]
    fn plus_concatenates_when_either_side_is_string() {
        let ctx = ctx_with(&[]);
        assert_eq!(eval_str("\"a\" + 1", &ctx), Value::String("a1".into()));
        assert_eq!(eval_str("1 + 2", &ctx), Value::Number(3.0));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let ctx = ctx_with(&[]);
        assert!(eval(&parse("1 / 0").unwrap(), &ctx).is_err());
    }

    #[test]
    fn builtin_functions() {
        let ctx = ctx_with(&[]);
        assert_eq!(eval_str("len(\"hello\")", &ctx), Value::Number(5.0));
        assert_eq!(eval_str("upper(\"ab\")", &ctx), Value::String("AB".into()));
        assert_eq!(eval_str("max(1, 5, 3)", &ctx), Value::Number(5.0));
        assert_eq!(eval_str("starts_with(\"hello\", \"he\")", &ctx), Value::Bool(true));
    }

    #[test]
    fn indexed_and_wildcard_paths_resolve() {
        let items = Value::Array(vec![
            Value::String("a".into()),
            Value::String("b".into()),
            Value::String("c".into()),
        ]);
        let ctx = ctx_with(&[("items", items)]);
        assert_eq!(eval_str("items[1]", &ctx), Value::String("b".into()));
        assert_eq!(eval_str("len(items[*])", &ctx), Value::Number(3.0));
        // Out-of-bounds index and wildcard on a non-array resolve to null.
        assert_eq!(eval_str("items[9]", &ctx), Value::Null);
        let ctx = ctx_with(&[("items", Value::String("oops".into()))]);
        assert_eq!(eval_str("items[*]", &ctx), Value::Null);
    }

    #[test]
    fn missing_path_short_circuits_before_unknown_function() {
        // The right side would raise "unknown function" if evaluated.
        let ctx = ctx_with(&[]);
        assert_eq!(eval_str("path.missing && crash()", &ctx), Value::Bool(false));
        assert!(eval(&parse("path.missing || crash()").unwrap(), &ctx).is_err());
    }

    #[test]
    fn contains_checks_array_membership_and_substrings() {
        let items = Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]);
        let ctx = ctx_with(&[("items", items)]);
        assert_eq!(eval_str("items contains 2", &ctx), Value::Bool(true));
        assert_eq!(eval_str("items contains 5", &ctx), Value::Bool(false));
        assert_eq!(eval_str("\"hello\" contains \"ell\"", &ctx), Value::Bool(true));
    }

    #[test]
    fn matches_rejects_catastrophic_patterns() {
        let ctx = ctx_with(&[]);
        assert!(eval(&parse("\"aaaa\" matches \"(a+)+$\"").unwrap(), &ctx).is_err());
    }

    #[test]
    fn tool_name_resolves_from_context() {
        let ctx = ctx_with(&[("tool_name", Value::String("delete_file".into()))]);
        assert_eq!(
            eval_str("tool_name == \"delete_file\"", &ctx),
            Value::Bool(true)
        );
    }
}
