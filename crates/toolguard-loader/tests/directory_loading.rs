//! On-disk loader tests: a real directory tree, real files, the real
//! filesystem implementation.

use std::fs;
use std::path::Path;
use toolguard_core::config::SigningPolicyConfig;
use toolguard_loader::{LoaderError, RuleLoader};
use toolguard_signing::{create_signed_bundle, generate_signing_key_pair, GeneratedKeyPair};

fn write_rules_yaml(dir: &Path, name: &str, ids: &[&str]) {
    let mut doc = String::from("version: \"1.0\"\nname: test\nrules:\n");
    for id in ids {
        doc.push_str(&format!(
            "  - id: {id}\n    name: {id}\n    severity: low\n    action: allow\n"
        ));
    }
    fs::write(dir.join(name), doc).unwrap();
}

fn write_signed_bundle(dir: &Path, name: &str, pair: &GeneratedKeyPair, declared_key_id: &str) {
    let rule_set = serde_json::json!({
        "version": "1.0",
        "name": "bundle",
        "rules": [{"id": "signed-rule", "name": "signed-rule", "severity": "high",
                   "action": "block", "tools": ["delete_file"]}]
    });
    let bundle = create_signed_bundle(&rule_set, &pair.private_key, declared_key_id).unwrap();
    fs::write(dir.join(name), bundle.to_json_pretty()).unwrap();
}

fn trusting(pair: &GeneratedKeyPair) -> SigningPolicyConfig {
    let mut config = SigningPolicyConfig {
        enabled: true,
        required: true,
        ..Default::default()
    };
    config
        .public_keys
        .insert(pair.key_id.clone(), pair.public_key.clone());
    config
}

#[test]
fn walks_nested_directories_and_loads_every_rule_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
    write_rules_yaml(dir.path(), "top.yaml", &["r1"]);
    write_rules_yaml(&dir.path().join("nested"), "mid.yml", &["r2"]);
    write_rules_yaml(&dir.path().join("nested/deeper"), "leaf.yaml", &["r3"]);
    fs::write(dir.path().join("ignored.txt"), "not rules").unwrap();

    let mut loader = RuleLoader::default();
    loader.load_from_directory(dir.path()).unwrap();
    assert_eq!(loader.loaded_rules().len(), 3);
    assert_eq!(loader.loaded_rules().sources().len(), 3);
}

#[test]
fn loading_a_directory_n_times_equals_loading_it_once() {
    let dir = tempfile::tempdir().unwrap();
    write_rules_yaml(dir.path(), "a.yaml", &["r1", "r2"]);

    let mut loader = RuleLoader::default();
    loader.load_from_directory(dir.path()).unwrap();
    let once = loader.loaded_rules().clone();

    for _ in 0..5 {
        loader.reload(dir.path()).unwrap();
    }
    assert_eq!(loader.loaded_rules(), &once);
}

#[test]
fn get_rules_for_tool_honors_enablement_and_tool_filters() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("rules.yaml"),
        r#"version: "1.0"
name: mixed
rules:
  - id: global-on
    name: global-on
    severity: low
    action: allow
  - id: global-off
    name: global-off
    enabled: false
    severity: low
    action: allow
  - id: scoped
    name: scoped
    severity: low
    action: allow
    tools: [delete_file, write_file]
"#,
    )
    .unwrap();

    let mut loader = RuleLoader::default();
    loader.load_from_directory(dir.path()).unwrap();
    let rules = loader.loaded_rules();

    for tool in ["delete_file", "write_file"] {
        let ids: Vec<_> = rules
            .get_rules_for_tool(tool)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["global-on", "scoped"], "tool {tool}");
    }
    let ids: Vec<_> = rules
        .get_rules_for_tool("read_file")
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(ids, vec!["global-on"]);
}

#[test]
fn untrusted_bundle_fails_the_whole_load_when_signing_is_required() {
    let dir = tempfile::tempdir().unwrap();
    let trusted = generate_signing_key_pair();
    let rogue = generate_signing_key_pair();
    write_signed_bundle(dir.path(), "rogue.signed.json", &rogue, &rogue.key_id);
    write_rules_yaml(dir.path(), "fine.yaml", &["r1"]);

    // `required` was left at its default (true): fail closed.
    let mut loader = RuleLoader::new(
        Box::new(toolguard_loader::RealFileSystem),
        Some(trusting(&trusted)),
    );
    let err = loader.load_from_directory(dir.path()).unwrap_err();
    assert!(matches!(err, LoaderError::BundleVerification { .. }));
}

#[test]
fn trusted_bundle_loads_alongside_plain_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let pair = generate_signing_key_pair();
    write_signed_bundle(dir.path(), "rules.signed.json", &pair, &pair.key_id);
    write_rules_yaml(dir.path(), "plain.yaml", &["plain-rule"]);

    let mut loader = RuleLoader::new(
        Box::new(toolguard_loader::RealFileSystem),
        Some(trusting(&pair)),
    );
    loader.load_from_directory(dir.path()).unwrap();
    assert_eq!(loader.loaded_rules().len(), 2);
    assert!(loader.loaded_rules().find_by_id("signed-rule").is_some());
    assert!(loader.loaded_rules().find_by_id("plain-rule").is_some());
}

#[test]
fn signing_not_configured_skips_bundles_but_loads_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let pair = generate_signing_key_pair();
    write_signed_bundle(dir.path(), "rules.signed.json", &pair, &pair.key_id);
    write_rules_yaml(dir.path(), "plain.yaml", &["plain-rule"]);

    let mut loader = RuleLoader::default();
    loader.load_from_directory(dir.path()).unwrap();
    assert_eq!(loader.loaded_rules().len(), 1);
    assert!(loader.loaded_rules().find_by_id("signed-rule").is_none());
}
