//! Guardrail runtime configuration.
//!
//! One serde-deserializable tree covering every recognized option, so a
//! host can load a single YAML/JSON config document, plus a builder for
//! constructing one programmatically and a `validate()` pass that
//! separates hard errors from operator warnings.

use crate::constraint::TypeMode;
use crate::context::ExplanationVerbosity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Recognized, validated runtime configuration for the guardrail engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GuardrailConfig {
    /// `log` mode demotes every would-be deny to a warning; the call is
    /// always allowed through.
    pub mode: ConfigMode,
    /// What to decide when no validator applies to the call's tool.
    pub default_decision: ConfigDefaultDecision,
    /// `strict` or `coercive` type comparison in the constraint engine.
    pub type_mode: ConfigTypeMode,
    pub explanation: ExplanationSettings,
    pub signing: SigningPolicyConfig,
    pub resilience: Option<ResilienceConfig>,
    /// `None` disables rate limiting.
    pub rate_limit: Option<RateLimitConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigTypeMode {
    Strict,
    #[default]
    Coercive,
}

impl From<ConfigTypeMode> for TypeMode {
    fn from(mode: ConfigTypeMode) -> Self {
        match mode {
            ConfigTypeMode::Strict => TypeMode::Strict,
            ConfigTypeMode::Coercive => TypeMode::Coercive,
        }
    }
}

/// `strict` enforces every deny as written; `log` demotes every would-be
/// deny to a warning so the final decision is never blocked, useful for
/// dry-running a new rule set against live traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigMode {
    #[default]
    Strict,
    Log,
}

/// What the engine decides when no validator applies at all. Guardrails
/// fail closed, so the default is deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigDefaultDecision {
    Allow,
    #[default]
    Deny,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExplanationSettings {
    pub verbosity: ConfigVerbosity,
    /// Argument path prefixes redacted from explanation traces.
    pub redact_paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigVerbosity {
    #[default]
    None,
    Simple,
    Verbose,
}

impl From<ConfigVerbosity> for ExplanationVerbosity {
    fn from(v: ConfigVerbosity) -> Self {
        match v {
            ConfigVerbosity::None => ExplanationVerbosity::None,
            ConfigVerbosity::Simple => ExplanationVerbosity::Simple,
            ConfigVerbosity::Verbose => ExplanationVerbosity::Verbose,
        }
    }
}

/// Whether and how strictly rule bundle signatures are enforced, plus the
/// trust anchors themselves. Consumed by `toolguard-loader`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningPolicyConfig {
    pub enabled: bool,
    /// When `enabled` is true: require a valid signature (fail closed) or
    /// merely warn and skip unsigned/invalid bundles. Defaults to true;
    /// treating an unset `required` as false would silently disable the
    /// guarantee signing exists to provide.
    pub required: bool,
    /// Key id to base64-DER public key.
    pub public_keys: BTreeMap<String, String>,
    /// Explicit opt-in: on a key-id miss, try every trusted key instead
    /// of rejecting. For operator-initiated key rotations only.
    pub allow_rotation: bool,
    pub pinned_version: Option<String>,
    pub pinned_hash: Option<String>,
}

impl Default for SigningPolicyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            required: true,
            public_keys: BTreeMap::new(),
            allow_rotation: false,
            pinned_version: None,
            pinned_hash: None,
        }
    }
}

/// On internal failure of the remote policy path: deny the call
/// (`fail-closed`) or let it through (`fail-open`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailMode {
    FailOpen,
    #[default]
    FailClosed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub fail_mode: FailMode,
    /// Overall deadline for one remote policy decision, retries included.
    pub deadline_ms: u64,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            fail_mode: FailMode::FailClosed,
            deadline_ms: 5_000,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    /// Concurrent probe attempts allowed while the breaker is half-open.
    pub half_open_max_attempts: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            half_open_max_attempts: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_calls: usize,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: 100,
            window_seconds: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("rate_limit.max_calls must be greater than zero")]
    ZeroRateLimit,
    #[error("resilience.retry.max_attempts must be greater than zero")]
    ZeroRetries,
    #[error("signing.enabled is set but signing.public_keys is empty")]
    SigningWithoutKeys,
}

/// Issues worth surfacing to an operator that don't block startup.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    SigningDisabled,
    RotationAllowed,
    RedactPathsEmptyWithFullVerbosity,
}

impl GuardrailConfig {
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        if let Some(rl) = &self.rate_limit {
            if rl.max_calls == 0 {
                return Err(ConfigError::ZeroRateLimit);
            }
        }
        if let Some(r) = &self.resilience {
            if r.retry.max_attempts == 0 {
                return Err(ConfigError::ZeroRetries);
            }
        }
        if self.signing.enabled && self.signing.public_keys.is_empty() {
            return Err(ConfigError::SigningWithoutKeys);
        }

        let mut warnings = Vec::new();
        if !self.signing.enabled {
            warnings.push(ConfigWarning::SigningDisabled);
        }
        if self.signing.allow_rotation {
            warnings.push(ConfigWarning::RotationAllowed);
        }
        if self.explanation.redact_paths.is_empty()
            && self.explanation.verbosity == ConfigVerbosity::Verbose
        {
            warnings.push(ConfigWarning::RedactPathsEmptyWithFullVerbosity);
        }
        Ok(warnings)
    }
}

/// Programmatic builder with the same defaults as the serde path.
#[derive(Debug, Clone, Default)]
pub struct GuardrailConfigBuilder {
    config: GuardrailConfig,
}

impl GuardrailConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: ConfigMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn default_decision(mut self, decision: ConfigDefaultDecision) -> Self {
        self.config.default_decision = decision;
        self
    }

    pub fn type_mode(mut self, mode: ConfigTypeMode) -> Self {
        self.config.type_mode = mode;
        self
    }

    pub fn explanation_verbosity(mut self, v: ConfigVerbosity) -> Self {
        self.config.explanation.verbosity = v;
        self
    }

    pub fn redact_path(mut self, path: impl Into<String>) -> Self {
        self.config.explanation.redact_paths.push(path.into());
        self
    }

    pub fn rate_limit(mut self, max_calls: usize, window_seconds: u64) -> Self {
        self.config.rate_limit = Some(RateLimitConfig {
            max_calls,
            window_seconds,
        });
        self
    }

    pub fn signing(mut self, signing: SigningPolicyConfig) -> Self {
        self.config.signing = signing;
        self
    }

    pub fn resilience(mut self, resilience: ResilienceConfig) -> Self {
        self.config.resilience = Some(resilience);
        self
    }

    pub fn build(self) -> Result<GuardrailConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fail_closed() {
        let config = GuardrailConfig::default();
        assert_eq!(config.mode, ConfigMode::Strict);
        assert_eq!(config.default_decision, ConfigDefaultDecision::Deny);
        assert_eq!(config.explanation.verbosity, ConfigVerbosity::None);
        assert!(config.signing.required);
        assert!(!config.signing.allow_rotation);
    }

    #[test]
    fn deserializes_the_full_option_tree() {
        let json = serde_json::json!({
            "mode": "log",
            "default_decision": "allow",
            "explanation": {"verbosity": "verbose", "redact_paths": ["arguments.password"]},
            "signing": {"enabled": true, "public_keys": {"abcd": "AAAA"}},
            "resilience": {"fail_mode": "fail-open", "deadline_ms": 250,
                           "retry": {"max_attempts": 5, "base_delay_ms": 10, "max_delay_ms": 100},
                           "circuit_breaker": {"failure_threshold": 2, "reset_timeout_ms": 1000,
                                               "half_open_max_attempts": 2}},
            "rate_limit": {"max_calls": 10, "window_seconds": 1}
        });
        let config: GuardrailConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.mode, ConfigMode::Log);
        assert_eq!(config.resilience.unwrap().fail_mode, FailMode::FailOpen);
        assert_eq!(config.rate_limit.unwrap().max_calls, 10);
        assert!(config.signing.required, "required defaults to true even when omitted");
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let config = GuardrailConfigBuilder::new().rate_limit(0, 60).build();
        assert_eq!(config, Err(ConfigError::ZeroRateLimit));
    }

    #[test]
    fn signing_enabled_without_keys_is_rejected() {
        let config = GuardrailConfigBuilder::new()
            .signing(SigningPolicyConfig {
                enabled: true,
                ..Default::default()
            })
            .build();
        assert_eq!(config, Err(ConfigError::SigningWithoutKeys));
    }

    #[test]
    fn builder_applies_overrides() {
        let config = GuardrailConfigBuilder::new()
            .type_mode(ConfigTypeMode::Strict)
            .rate_limit(10, 30)
            .build()
            .unwrap();
        assert_eq!(config.type_mode, ConfigTypeMode::Strict);
        assert_eq!(config.rate_limit.unwrap().max_calls, 10);
    }
}
