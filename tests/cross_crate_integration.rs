//! Cross-crate integration tests verifying contracts between workspace
//! crates.
//!
//! These tests simulate how an embedding host wires the crates together:
//! keys and bundles from toolguard-signing, a rules directory loaded by
//! toolguard-loader, a pipeline built from toolguard-core, and a remote
//! policy path guarded by toolguard-resilience.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use toolguard_core::config::SigningPolicyConfig;
use toolguard_core::constraint::TypeMode;
use toolguard_core::{
    Decision, Engine, ExplanationConfig, ExplanationVerbosity, RuleValidator, ValidationContext,
    Value,
};
use toolguard_loader::RuleLoader;
use toolguard_signing::{create_signed_bundle, generate_signing_key_pair};

fn args(pairs: &[(&str, Value)]) -> Value {
    let mut map = BTreeMap::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v.clone());
    }
    Value::Object(map)
}

// ============================================================================
// Signed rules, loaded from disk, enforced by the pipeline
// ============================================================================

#[test]
fn signed_rules_flow_from_disk_to_a_deny_decision() {
    let pair = generate_signing_key_pair();
    let rule_set = serde_json::json!({
        "version": "1.0",
        "name": "payments",
        "rules": [{
            "id": "block-large-charges",
            "name": "Block large charges",
            "description": "charges above 1000 need manual approval",
            "severity": "high",
            "action": "block",
            "tools": ["charge"],
            "conditions": [{"field": "amount", "operator": "greater_than", "value": 1000}]
        }]
    });
    let bundle = create_signed_bundle(&rule_set, &pair.private_key, &pair.key_id).unwrap();

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("payments.signed.json"), bundle.to_json_pretty()).unwrap();

    let mut signing = SigningPolicyConfig {
        enabled: true,
        ..Default::default()
    };
    signing.public_keys.insert(pair.key_id, pair.public_key);

    let mut loader = RuleLoader::new(Box::new(toolguard_loader::RealFileSystem), Some(signing));
    loader.load_from_directory(dir.path()).unwrap();

    let engine = Engine::new(ExplanationConfig {
        verbosity: ExplanationVerbosity::Verbose,
        redact_paths: vec![],
    });
    engine.add_validator(Arc::new(RuleValidator::new(
        loader.loaded_rules().clone(),
        TypeMode::Coercive,
    )));

    let denied = engine.validate(ValidationContext::new(
        "charge",
        args(&[("amount", Value::Number(5000.0))]),
    ));
    assert_eq!(denied.decision, Decision::Deny);
    assert_eq!(
        denied.reason.as_deref(),
        Some("charges above 1000 need manual approval")
    );
    assert_eq!(denied.validator_name.as_deref(), Some("rule_validator"));
    assert!(denied
        .explanation
        .trace
        .iter()
        .any(|e| e.rule_id.as_deref() == Some("block-large-charges")));

    let allowed = engine.validate(ValidationContext::new(
        "charge",
        args(&[("amount", Value::Number(50.0))]),
    ));
    assert_eq!(allowed.decision, Decision::Allow);

    // The rule is scoped to `charge`; other tools sail through.
    let other_tool = engine.validate(ValidationContext::new(
        "read_file",
        args(&[("amount", Value::Number(5000.0))]),
    ));
    assert_eq!(other_tool.decision, Decision::Allow);
}

#[test]
fn reloading_rules_swaps_atomically_into_a_live_validator() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("rules.yaml"),
        "version: \"1.0\"\nname: v1\nrules:\n  - id: block-all\n    name: block-all\n    severity: high\n    action: block\n",
    )
    .unwrap();

    let mut loader = RuleLoader::default();
    loader.load_from_directory(dir.path()).unwrap();
    let validator = Arc::new(RuleValidator::new(
        loader.loaded_rules().clone(),
        TypeMode::Coercive,
    ));

    let engine = Engine::new(ExplanationConfig::default());
    engine.add_validator(Arc::clone(&validator) as Arc<dyn toolguard_core::Validator>);

    let ctx = || ValidationContext::new("anything", args(&[]));
    assert_eq!(engine.validate(ctx()).decision, Decision::Deny);

    fs::write(
        dir.path().join("rules.yaml"),
        "version: \"1.0\"\nname: v2\nrules: []\n",
    )
    .unwrap();
    loader.reload(dir.path()).unwrap();
    validator.reload(loader.loaded_rules().clone());

    assert_eq!(engine.validate(ctx()).decision, Decision::Allow);
}

// ============================================================================
// Modify rules rewrite arguments before the host sees them
// ============================================================================

#[test]
fn modify_rule_rewrites_arguments_for_the_host() {
    let mut loader = RuleLoader::default();
    loader.load_from_string(
        "inline",
        r#"
version: "1.0"
name: sanitize
rules:
  - id: force-dry-run
    name: force-dry-run
    severity: medium
    action: modify
    tools: [deploy]
    modify:
      dry_run: true
"#,
    )
    .unwrap();

    let engine = Engine::new(ExplanationConfig::default());
    engine.add_validator(Arc::new(RuleValidator::new(
        loader.loaded_rules().clone(),
        TypeMode::Coercive,
    )));

    let result = engine.validate(ValidationContext::new(
        "deploy",
        args(&[("target", Value::String("prod".into()))]),
    ));
    assert_eq!(result.decision, Decision::Modify);
    let modified = result.arguments.as_object().unwrap();
    assert_eq!(modified.get("dry_run"), Some(&Value::Bool(true)));
    assert_eq!(modified.get("target"), Some(&Value::String("prod".into())));
}

// ============================================================================
// Remote policy path
// ============================================================================

#[tokio::test]
async fn remote_policy_client_feeds_the_local_decision_vocabulary() {
    use std::time::Duration;
    use toolguard_core::config::FailMode;
    use toolguard_resilience::{
        CircuitBreaker, MockClock, PolicyRequest, RawDecision, RemotePolicyClient, RetryPolicy,
    };

    let breaker = Arc::new(CircuitBreaker::new(
        Box::new(MockClock::new()),
        3,
        Duration::from_secs(30),
    ));
    let client = RemotePolicyClient::new(
        |req: PolicyRequest| async move {
            if req.tool_name == "delete_file" {
                Ok(RawDecision::Block)
            } else {
                Ok(RawDecision::Pass)
            }
        },
        breaker,
        RetryPolicy::new(2, Duration::from_millis(1)),
        FailMode::FailClosed,
    );

    let deny = client
        .decide(&PolicyRequest {
            tool_name: "delete_file".into(),
            arguments: serde_json::json!({}),
            call_id: None,
        })
        .await;
    assert_eq!(deny, Decision::Deny);

    let allow = client
        .decide(&PolicyRequest {
            tool_name: "read_file".into(),
            arguments: serde_json::json!({}),
            call_id: None,
        })
        .await;
    assert_eq!(allow, Decision::Allow);
}
