//! Sign/verify round-trip contracts for the bundle format.

use toolguard_signing::{
    create_signed_bundle, derive_key_id, generate_signing_key_pair, parse_bundle_payload,
    sha256_hex, verify_bundle, SignedBundle, SigningConfig, VerifyError,
};

fn rule_set_json() -> serde_json::Value {
    serde_json::json!({
        "version": "1.0",
        "name": "payments",
        "rules": [
            {"id": "r1", "name": "r1", "severity": "high", "action": "block",
             "conditions": [{"field": "amount", "operator": "greater_than", "value": 1000}]}
        ]
    })
}

#[test]
fn payload_round_trips_through_sign_and_parse() {
    let pair = generate_signing_key_pair();
    let bundle = create_signed_bundle(&rule_set_json(), &pair.private_key, &pair.key_id).unwrap();
    assert_eq!(parse_bundle_payload(&bundle).unwrap(), rule_set_json());
}

#[test]
fn verify_accepts_a_bundle_signed_by_a_trusted_key() {
    let pair = generate_signing_key_pair();
    let bundle = create_signed_bundle(&rule_set_json(), &pair.private_key, &pair.key_id).unwrap();
    let config = SigningConfig::with_key(pair.key_id, pair.public_key);
    assert_eq!(verify_bundle(&bundle, &config), Ok(()));
}

#[test]
fn derive_key_id_matches_the_generated_key_id() {
    let pair = generate_signing_key_pair();
    assert_eq!(derive_key_id(&pair.public_key).unwrap(), pair.key_id);
}

#[test]
fn mutating_any_signed_field_breaks_verification() {
    let pair = generate_signing_key_pair();
    let bundle = create_signed_bundle(&rule_set_json(), &pair.private_key, &pair.key_id).unwrap();
    let config = SigningConfig::with_key(pair.key_id.clone(), pair.public_key.clone());

    // Payload byte flipped.
    let mut tampered = bundle.clone();
    tampered.payload = tampered.payload.replacen("r1", "r2", 1);
    assert!(verify_bundle(&tampered, &config).is_err());

    // Hash byte flipped.
    let mut tampered = bundle.clone();
    let flipped = if tampered.payload_hash.starts_with('0') { "1" } else { "0" };
    tampered.payload_hash.replace_range(0..1, flipped);
    assert!(verify_bundle(&tampered, &config).is_err());

    // Signature byte flipped.
    let mut tampered = bundle.clone();
    let first = tampered.signature.remove(0);
    let replacement = if first == 'A' { 'B' } else { 'A' };
    tampered.signature.insert(0, replacement);
    assert!(verify_bundle(&tampered, &config).is_err());

    // And the untouched bundle still verifies.
    assert_eq!(verify_bundle(&bundle, &config), Ok(()));
}

#[test]
fn consistent_payload_and_hash_but_wrong_signer_is_rejected() {
    let signer = generate_signing_key_pair();
    let trusted = generate_signing_key_pair();
    // Attacker signs with their own key but claims the trusted key's id.
    let bundle = create_signed_bundle(&rule_set_json(), &signer.private_key, &trusted.key_id).unwrap();
    let config = SigningConfig::with_key(trusted.key_id, trusted.public_key);
    assert!(matches!(
        verify_bundle(&bundle, &config),
        Err(VerifyError::Signature(_))
    ));
}

#[test]
fn on_disk_json_round_trips() {
    let pair = generate_signing_key_pair();
    let bundle = create_signed_bundle(&rule_set_json(), &pair.private_key, &pair.key_id).unwrap();
    let text = bundle.to_json_pretty();
    let parsed = SignedBundle::from_json(&text).unwrap();
    assert_eq!(parsed, bundle);
    assert_eq!(parsed.payload_hash, sha256_hex(parsed.payload.as_bytes()));
}

#[test]
fn canonicalization_makes_key_order_irrelevant_to_the_signature() {
    let pair = generate_signing_key_pair();
    let a = serde_json::json!({"name": "n", "version": "1.0", "rules": []});
    let b = serde_json::json!({"version": "1.0", "rules": [], "name": "n"});
    let bundle_a = create_signed_bundle(&a, &pair.private_key, &pair.key_id).unwrap();
    let bundle_b = create_signed_bundle(&b, &pair.private_key, &pair.key_id).unwrap();
    assert_eq!(bundle_a.payload, bundle_b.payload);
    assert_eq!(bundle_a.payload_hash, bundle_b.payload_hash);
    assert_eq!(bundle_a.signature, bundle_b.signature);
}
