//! Combines the constraint engine and the expression evaluator to decide
//! whether a [`Rule`] matches a [`ValidationContext`].

use crate::constraint::{self, TypeMode};
use crate::context::ValidationContext;
use crate::error::ConstraintError;
use crate::expr::{CompiledExpression, EvalContext};
use crate::model::{Condition, Conjunction, Rule};

/// Whether a rule matched, plus the diagnostic trail used to build trace
/// entries (matched_rules, then checked_fields, then field_path).
pub struct MatchOutcome {
    pub matched: bool,
    pub checked_fields: Vec<String>,
    pub errors: Vec<ConstraintError>,
}

/// Evaluate a single rule's predicates.
///
/// A rule with neither `conditions` nor `condition_groups` matches
/// unconditionally. Otherwise it matches when every top-level condition
/// passes *and* (if any groups are present) at least one group's
/// conjunction passes entirely.
pub fn evaluate_rule(rule: &Rule, ctx: &ValidationContext, mode: TypeMode) -> MatchOutcome {
    if rule.is_unconditional() {
        return MatchOutcome {
            matched: true,
            checked_fields: Vec::new(),
            errors: Vec::new(),
        };
    }

    let mut checked_fields = Vec::new();
    let mut errors = Vec::new();

    let top_level_pass = evaluate_conjunction(&rule.conditions, ctx, mode, &mut checked_fields, &mut errors);

    let groups_pass = if rule.condition_groups.is_empty() {
        true
    } else {
        rule.condition_groups.iter().any(|group| {
            let mut group_fields = Vec::new();
            let mut group_errors = Vec::new();
            let pass = evaluate_conjunction(group, ctx, mode, &mut group_fields, &mut group_errors);
            checked_fields.extend(group_fields);
            if !pass {
                errors.extend(group_errors);
            }
            pass
        })
    };

    MatchOutcome {
        matched: top_level_pass && groups_pass,
        checked_fields,
        errors,
    }
}

/// AND all conditions in `conjunction`, never short-circuiting so every
/// field is checked and every error collected.
fn evaluate_conjunction(
    conjunction: &Conjunction,
    ctx: &ValidationContext,
    mode: TypeMode,
    checked_fields: &mut Vec<String>,
    errors: &mut Vec<ConstraintError>,
) -> bool {
    let mut sorted: Vec<&Condition> = conjunction.iter().collect();
    sorted.sort_by_key(|c| c.sort_key());

    let mut all_pass = true;
    for condition in sorted {
        match condition {
            Condition::Field {
                field,
                operator,
                value,
            } => {
                checked_fields.push(field.clone());
                let result = constraint::evaluate_field(field, *operator, value, &ctx.arguments, mode);
                if !result.pass() {
                    all_pass = false;
                    errors.extend(result.errors);
                }
            }
            Condition::Expression { expression } => {
                checked_fields.push(format!("expr:{expression}"));
                match CompiledExpression::compile(expression) {
                    Ok(compiled) => {
                        let eval_ctx = EvalContext::new(ctx.to_eval_root());
                        match compiled.evaluate_bool(&eval_ctx) {
                            Ok(true) => {}
                            Ok(false) => all_pass = false,
                            Err(_) => all_pass = false,
                        }
                    }
                    Err(_) => all_pass = false,
                }
            }
        }
    }
    all_pass
}
