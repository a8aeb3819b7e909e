//! The signing-mode policy table: what to do with a `.signed.json` file
//! given the configured signing settings.

use toolguard_core::config::SigningPolicyConfig;

/// Historical code paths that treated an undefined `required` as `false`
/// are bugs; the default is fail-closed.
pub const SIGNING_REQUIRED_DEFAULT: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOutcome {
    /// Skip the bundle; log the given reason as a warning.
    SkipWithWarning(&'static str),
    /// Verify the bundle; a failure must propagate to the caller.
    VerifyRequired,
    /// Verify the bundle; a failure is logged and the bundle is skipped.
    VerifyBestEffort,
}

/// Apply the signing-mode policy table for a `.signed.json` file.
pub fn decide(config: Option<&SigningPolicyConfig>) -> PolicyOutcome {
    let Some(config) = config else {
        return PolicyOutcome::SkipWithWarning("signing not configured");
    };
    if !config.enabled {
        return PolicyOutcome::SkipWithWarning("signing is disabled");
    }
    if config.required {
        PolicyOutcome::VerifyRequired
    } else {
        PolicyOutcome::VerifyBestEffort
    }
}
