//! The sequential validator pipeline engine.
//!
//! Validators run one at a time, lowest priority first, over an evolving
//! context: a `modify` result swaps the arguments every later validator
//! sees, a `deny` stops the pipeline, and a validator error is itself a
//! deny. The engine never returns an error to the host; every internal
//! failure is folded into the decision.

use crate::config::{ConfigDefaultDecision, ConfigMode, GuardrailConfig, RateLimitConfig};
use crate::context::{
    AggregatedValidationResult, Explanation, ExplanationConfig, ExplanationVerbosity, TraceEntry,
    TraceOutcome, ValidationContext,
};
use crate::model::Decision;
use crate::path;
use crate::rate_limit::RateLimiter;
use crate::validator::{ValidationResult, Validator, ValidatorMetadata};
use crate::value::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

pub const REDACTED: &str = "[REDACTED]";

/// Cooperative cancellation handle supplied by the host. Checked between
/// validators; a cancelled pipeline hard-stops with a deny.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct Registered {
    validator: Arc<dyn Validator>,
    meta: ValidatorMetadata,
    order: usize,
}

/// Owns the validator list and runs it over each call.
///
/// The applicable-validator list is snapshotted (cloned `Arc`s) at call
/// entry, so a concurrent `add_validator`/`remove_validator` is never
/// observed mid-pipeline.
pub struct Engine {
    validators: RwLock<Vec<Registered>>,
    next_order: Mutex<usize>,
    explanation: ExplanationConfig,
    rate_limit: Option<RateLimitConfig>,
    rate_limiter: Option<Mutex<RateLimiter>>,
    mode: ConfigMode,
    default_decision: ConfigDefaultDecision,
}

impl Engine {
    pub fn new(explanation: ExplanationConfig) -> Self {
        Self {
            validators: RwLock::new(Vec::new()),
            next_order: Mutex::new(0),
            explanation,
            rate_limit: None,
            rate_limiter: None,
            mode: ConfigMode::Strict,
            default_decision: ConfigDefaultDecision::Deny,
        }
    }

    /// Build an engine from the recognized configuration options.
    pub fn from_config(config: &GuardrailConfig) -> Self {
        let mut engine = Self::new(ExplanationConfig {
            verbosity: config.explanation.verbosity.into(),
            redact_paths: config.explanation.redact_paths.clone(),
        });
        engine.mode = config.mode;
        engine.default_decision = config.default_decision;
        if let Some(rl) = config.rate_limit {
            engine = engine.with_rate_limit(rl);
        }
        engine
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limiter = Some(Mutex::new(RateLimiter::new(config.max_calls, config.window())));
        self.rate_limit = Some(config);
        self
    }

    /// `log` mode demotes every would-be deny to a warning: the pipeline
    /// keeps running and the final decision is never `deny`.
    pub fn with_mode(mut self, mode: ConfigMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_default_decision(mut self, decision: ConfigDefaultDecision) -> Self {
        self.default_decision = decision;
        self
    }

    pub fn add_validator(&self, validator: Arc<dyn Validator>) {
        let meta = validator.metadata();
        let mut order_guard = self.next_order.lock().expect("order lock poisoned");
        let order = *order_guard;
        *order_guard += 1;
        drop(order_guard);

        let mut validators = self.validators.write().expect("validators lock poisoned");
        validators.push(Registered {
            validator,
            meta,
            order,
        });
        validators.sort_by_key(|r| (r.meta.priority, r.order));
    }

    pub fn remove_validator(&self, name: &str) -> bool {
        let mut validators = self.validators.write().expect("validators lock poisoned");
        let before = validators.len();
        validators.retain(|r| r.meta.name != name);
        validators.len() != before
    }

    pub fn clear_validators(&self) {
        self.validators
            .write()
            .expect("validators lock poisoned")
            .clear();
    }

    fn applicable(&self, tool_name: &str) -> Vec<(ValidatorMetadata, Arc<dyn Validator>)> {
        self.validators
            .read()
            .expect("validators lock poisoned")
            .iter()
            .filter(|r| r.meta.applies_to(tool_name))
            .map(|r| (r.meta.clone(), Arc::clone(&r.validator)))
            .collect()
    }

    pub fn validate(&self, ctx: ValidationContext) -> AggregatedValidationResult {
        self.validate_with_cancel(ctx, &CancelToken::new())
    }

    /// Run every applicable validator in priority order over one call.
    pub fn validate_with_cancel(
        &self,
        mut ctx: ValidationContext,
        cancel: &CancelToken,
    ) -> AggregatedValidationResult {
        let started = Instant::now();
        let verbosity = self.explanation.verbosity;
        let mut trace: Vec<TraceEntry> = Vec::new();
        let mut evaluated = 0usize;
        let mut matched = 0usize;
        let mut remediation: Vec<String> = Vec::new();

        if let (Some(limiter), Some(config)) = (&self.rate_limiter, &self.rate_limit) {
            let allowed = limiter
                .lock()
                .expect("rate limiter lock poisoned")
                .check_and_record(&ctx.tool_name, Instant::now());
            if !allowed {
                let reason = format!(
                    "Rate limit exceeded: {} validations per {}ms",
                    config.max_calls,
                    config.window().as_millis()
                );
                if verbosity != ExplanationVerbosity::None {
                    trace.push(TraceEntry {
                        rule_id: None,
                        rule_name: None,
                        constraint: "rate_limit".to_string(),
                        path: "arguments".to_string(),
                        expected: String::new(),
                        actual: String::new(),
                        result: TraceOutcome::Fail,
                        message: reason.clone(),
                    });
                }
                if self.mode == ConfigMode::Strict {
                    remediation.push(format!("Fix: {reason}"));
                    return self.finish(
                        Decision::Deny,
                        Some(reason),
                        Some("rate_limit".to_string()),
                        ctx.arguments,
                        trace,
                        evaluated,
                        matched,
                        remediation,
                        started,
                    );
                }
                tracing::warn!(tool = %ctx.tool_name, %reason, "rate limit demoted to warning in log mode");
            }
        }

        let snapshot = self.applicable(&ctx.tool_name);
        if snapshot.is_empty() {
            let decision = match self.default_decision {
                ConfigDefaultDecision::Allow => Decision::Allow,
                ConfigDefaultDecision::Deny => Decision::Deny,
            };
            let reason = match decision {
                Decision::Deny => Some("no validator applies and the default decision is deny".to_string()),
                _ => None,
            };
            return self.finish(
                decision, reason, None, ctx.arguments, trace, evaluated, matched, remediation,
                started,
            );
        }

        let mut any_modified = false;
        let mut final_reason: Option<String> = None;
        let mut deciding_validator: Option<String> = None;

        for (meta, validator) in snapshot {
            if cancel.is_cancelled() {
                return self.finish(
                    Decision::Deny,
                    Some("cancelled".to_string()),
                    None,
                    ctx.arguments,
                    trace,
                    evaluated,
                    matched,
                    Vec::new(),
                    started,
                );
            }

            evaluated += 1;
            let result = match validator.validate(&ctx) {
                Ok(result) => result,
                Err(message) => {
                    let reason = format!("Validator \"{}\" threw an error: {message}", meta.name);
                    matched += 1;
                    if verbosity != ExplanationVerbosity::None {
                        trace.push(TraceEntry {
                            rule_id: None,
                            rule_name: None,
                            constraint: "validator.error".to_string(),
                            path: "arguments".to_string(),
                            expected: String::new(),
                            actual: String::new(),
                            result: TraceOutcome::Fail,
                            message: reason.clone(),
                        });
                    }
                    remediation.push(format!("Fix: {reason}"));
                    if self.mode == ConfigMode::Strict {
                        return self.finish(
                            Decision::Deny,
                            Some(reason),
                            Some(meta.name),
                            ctx.arguments,
                            trace,
                            evaluated,
                            matched,
                            remediation,
                            started,
                        );
                    }
                    tracing::warn!(validator = %meta.name, %reason, "validator error demoted to warning in log mode");
                    continue;
                }
            };

            let include = match verbosity {
                ExplanationVerbosity::None => false,
                ExplanationVerbosity::Simple => result.decision != Decision::Allow,
                ExplanationVerbosity::Verbose => true,
            };
            if include {
                trace.extend(trace_entries(&meta.name, &result, &ctx.arguments));
            }

            match result.decision {
                Decision::Allow => {}
                Decision::Modify => {
                    matched += 1;
                    if let Some(args) = result.modified_arguments {
                        ctx.arguments = args;
                    }
                    any_modified = true;
                    final_reason = result.reason;
                    deciding_validator = Some(meta.name);
                }
                Decision::Deny => {
                    matched += 1;
                    let reason = result
                        .reason
                        .unwrap_or_else(|| format!("denied by validator {:?}", meta.name));
                    remediation.push(format!("Fix: {reason}"));
                    if self.mode == ConfigMode::Strict {
                        return self.finish(
                            Decision::Deny,
                            Some(reason),
                            Some(meta.name),
                            ctx.arguments,
                            trace,
                            evaluated,
                            matched,
                            remediation,
                            started,
                        );
                    }
                    tracing::warn!(validator = %meta.name, %reason, "deny demoted to warning in log mode");
                }
            }
        }

        let decision = if any_modified {
            Decision::Modify
        } else {
            Decision::Allow
        };
        self.finish(
            decision,
            final_reason,
            deciding_validator,
            ctx.arguments,
            trace,
            evaluated,
            matched,
            remediation,
            started,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        decision: Decision,
        reason: Option<String>,
        validator_name: Option<String>,
        arguments: Value,
        mut trace: Vec<TraceEntry>,
        evaluated_rules: usize,
        matched_rules: usize,
        remediation: Vec<String>,
        started: Instant,
    ) -> AggregatedValidationResult {
        for entry in &mut trace {
            if self.explanation.is_redacted(&entry.path) {
                entry.expected = REDACTED.to_string();
                entry.actual = REDACTED.to_string();
            }
        }

        let explanation = Explanation {
            decision,
            reason: reason.clone().unwrap_or_default(),
            verbosity: self.explanation.verbosity,
            trace,
            evaluated_rules,
            matched_rules,
            evaluation_time_ms: started.elapsed().as_millis() as u64,
            remediation: if decision == Decision::Deny {
                remediation
            } else {
                Vec::new()
            },
        };

        AggregatedValidationResult {
            decision,
            reason,
            validator_name,
            arguments,
            explanation,
        }
    }
}

/// Build trace entries for one validator result.
///
/// Entry granularity follows the result metadata: one entry per matched
/// rule id when rules matched, else one per checked field (with the
/// field's current value as `actual`), else a single entry for the
/// validator as a whole.
fn trace_entries(validator_name: &str, result: &ValidationResult, args: &Value) -> Vec<TraceEntry> {
    let outcome = if result.decision == Decision::Allow {
        TraceOutcome::Pass
    } else {
        TraceOutcome::Fail
    };
    let message = result.reason.clone().unwrap_or_default();
    let md = &result.metadata;

    let default_path = || {
        md.field_path.clone().unwrap_or_else(|| {
            md.checked_fields
                .first()
                .map(|f| format!("arguments.{f}"))
                .unwrap_or_else(|| "arguments".to_string())
        })
    };

    if !md.matched_rules.is_empty() {
        return md
            .matched_rules
            .iter()
            .map(|rule_id| TraceEntry {
                rule_id: Some(rule_id.clone()),
                rule_name: None,
                constraint: validator_name.to_string(),
                path: default_path(),
                expected: String::new(),
                actual: String::new(),
                result: outcome,
                message: message.clone(),
            })
            .collect();
    }

    if !md.checked_fields.is_empty() {
        return md
            .checked_fields
            .iter()
            .map(|field| TraceEntry {
                rule_id: None,
                rule_name: None,
                constraint: validator_name.to_string(),
                path: format!("arguments.{field}"),
                expected: String::new(),
                actual: value_at(args, field),
                result: outcome,
                message: message.clone(),
            })
            .collect();
    }

    vec![TraceEntry {
        rule_id: None,
        rule_name: None,
        constraint: validator_name.to_string(),
        path: md.field_path.clone().unwrap_or_else(|| "arguments".to_string()),
        expected: String::new(),
        actual: String::new(),
        result: outcome,
        message,
    }]
}

fn value_at(args: &Value, field: &str) -> String {
    let segments = path::parse_path(field);
    path::resolve(args, &segments)
        .into_iter()
        .find(|c| c.found)
        .map(|c| c.value.coerce_to_string())
        .unwrap_or_default()
}
