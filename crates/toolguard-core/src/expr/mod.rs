//! Boolean expression language: lexer, parser, and evaluator.
//!
//! Expressions compile once into an [`ast::Expr`] and can then be
//! evaluated repeatedly against different contexts without re-parsing.

mod ast;
mod eval;
mod parser;
mod token;

pub use ast::{Expr, MAX_AST_DEPTH};
pub use eval::EvalContext;

use crate::error::ExpressionError;
use crate::value::Value;

/// A parsed, ready-to-evaluate expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    ast: Expr,
}

impl CompiledExpression {
    pub fn compile(source: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            ast: parser::parse(source)?,
        })
    }

    pub fn evaluate(&self, ctx: &EvalContext) -> Result<Value, ExpressionError> {
        eval::eval(&self.ast, ctx)
    }

    /// Evaluate and coerce the result to a boolean the way a condition
    /// would: null, false, zero, and empty strings/arrays/objects are
    /// falsy, everything else is truthy.
    pub fn evaluate_bool(&self, ctx: &EvalContext) -> Result<bool, ExpressionError> {
        let v = self.evaluate(ctx)?;
        Ok(match v {
            Value::Bool(b) => b,
            Value::Null => false,
            Value::Number(n) => n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn compiles_and_evaluates() {
        let expr = CompiledExpression::compile("amount > 100 && tool_name == \"charge\"").unwrap();
        let mut map = BTreeMap::new();
        map.insert("amount".to_string(), Value::Number(150.0));
        map.insert("tool_name".to_string(), Value::String("charge".into()));
        let ctx = EvalContext::new(Value::Object(map));
        assert!(expr.evaluate_bool(&ctx).unwrap());
    }

    #[test]
    fn compile_surfaces_parse_errors() {
        assert!(CompiledExpression::compile("amount >").is_err());
    }
}
