//! The built-in [`Validator`] driven by a loaded rule set.

use crate::constraint::TypeMode;
use crate::context::ValidationContext;
use crate::model::Action;
use crate::rule_match::evaluate_rule;
use crate::rules_index::LoadedRules;
use crate::validator::{ResultMetadata, ValidationResult, Validator, ValidatorMetadata};
use crate::value::Value;
use std::sync::RwLock;

/// Evaluates every rule applicable to the call's tool, in load order
/// (global rules first). The first matching `block` rule denies
/// immediately; matching `modify` rules apply their patches in sequence;
/// matching `warn`/`allow` rules are recorded but never change the
/// decision.
pub struct RuleValidator {
    rules: RwLock<LoadedRules>,
    mode: TypeMode,
}

impl RuleValidator {
    pub fn new(rules: LoadedRules, mode: TypeMode) -> Self {
        Self {
            rules: RwLock::new(rules),
            mode,
        }
    }

    /// Atomically swap in a freshly reloaded rule set.
    pub fn reload(&self, rules: LoadedRules) {
        *self.rules.write().expect("rule validator lock poisoned") = rules;
    }
}

impl Validator for RuleValidator {
    fn metadata(&self) -> ValidatorMetadata {
        ValidatorMetadata::new("rule_validator")
    }

    fn validate(&self, ctx: &ValidationContext) -> Result<ValidationResult, String> {
        let rules = self
            .rules
            .read()
            .map_err(|_| "rule validator lock poisoned".to_string())?;

        let mut matched_rules = Vec::new();
        let mut checked_fields = Vec::new();
        let mut pending_arguments: Option<Value> = None;

        for rule in rules.get_rules_for_tool(&ctx.tool_name) {
            let working_ctx = match &pending_arguments {
                Some(args) => ValidationContext {
                    arguments: args.clone(),
                    ..ctx.clone()
                },
                None => ctx.clone(),
            };

            let outcome = evaluate_rule(rule, &working_ctx, self.mode);
            checked_fields.extend(outcome.checked_fields);
            if !outcome.matched {
                continue;
            }
            matched_rules.push(rule.id.clone());

            match rule.action {
                Action::Block => {
                    let reason = rule
                        .description
                        .clone()
                        .unwrap_or_else(|| format!("blocked by rule {}", rule.id));
                    return Ok(ValidationResult::deny(reason).with_metadata(ResultMetadata {
                        matched_rules,
                        checked_fields,
                        field_path: None,
                    }));
                }
                Action::Modify => {
                    if let Some(patch) = &rule.modify {
                        let base = pending_arguments
                            .clone()
                            .unwrap_or_else(|| ctx.arguments.clone());
                        pending_arguments = Some(apply_patch(base, patch));
                    }
                }
                Action::Warn | Action::Allow => {}
            }
        }

        let metadata = ResultMetadata {
            matched_rules,
            checked_fields,
            field_path: None,
        };
        Ok(match pending_arguments {
            Some(arguments) => {
                ValidationResult::modify(arguments, "matched modify rule(s)").with_metadata(metadata)
            }
            None => ValidationResult::allow().with_metadata(metadata),
        })
    }
}

/// Apply a flat set of top-level field patches to an object-shaped value.
/// Non-object arguments are returned unchanged: a `modify` rule against
/// non-object arguments has nothing to patch.
fn apply_patch(arguments: Value, patch: &std::collections::BTreeMap<String, serde_json::Value>) -> Value {
    match arguments {
        Value::Object(mut map) => {
            for (k, v) in patch {
                map.insert(k.clone(), Value::from_json(v.clone()));
            }
            Value::Object(map)
        }
        other => other,
    }
}
