//! Signed rule bundle format: canonical payload, hash, Ed25519 signature.
//!
//! The on-disk format is a pretty-printed JSON object with camelCase
//! fields. Unknown top-level fields are ignored on parse; missing
//! required fields are a [`BundleFormatError`].

use crate::canonical::canonicalize;
use crate::hash::sha256_hex;
use crate::keys::decode_signing_key;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer};
use serde::{Deserialize, Serialize};

pub const BUNDLE_FORMAT_VERSION: &str = "1.0";

/// A canonicalized rule-set payload plus its hash and signature.
///
/// `payload` is the canonical JSON string of the rule set: the signature
/// covers the payload bytes, and `payload_hash` is a separate SHA-256
/// over those same bytes so that tampering with the hash field itself is
/// detected even though the signature does not cover it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedBundle {
    pub version: String,
    pub payload: String,
    pub payload_hash: String,
    pub signature: String,
    pub public_key_id: String,
    pub signed_at: DateTime<Utc>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BundleFormatError {
    #[error("bundle is not a valid signed-bundle JSON object: {0}")]
    Malformed(String),
    #[error("unsupported bundle format version: {0:?} (expected {BUNDLE_FORMAT_VERSION:?})")]
    UnsupportedVersion(String),
    #[error("signature is not valid base64 or has the wrong length")]
    InvalidSignatureEncoding,
    #[error("payload is not valid JSON: {0}")]
    InvalidPayload(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SignError {
    #[error("private key could not be decoded: {0}")]
    InvalidPrivateKey(crate::keys::KeyDecodeError),
}

impl SignedBundle {
    /// Parse a bundle from its on-disk JSON. Unknown fields are ignored;
    /// anything missing or mistyped is a format error.
    pub fn from_json(content: &str) -> Result<Self, BundleFormatError> {
        serde_json::from_str(content).map_err(|e| BundleFormatError::Malformed(e.to_string()))
    }

    /// The on-disk representation: pretty-printed JSON.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).expect("bundle serialization cannot fail")
    }
}

/// Canonicalize `rule_set`, hash it, and sign the payload bytes.
///
/// `public_key_id` is recorded as-is; verification later looks the key up
/// under this id, so the caller is responsible for supplying the id the
/// verifier's trust set uses.
pub fn create_signed_bundle(
    rule_set: &serde_json::Value,
    private_key: &str,
    public_key_id: &str,
) -> Result<SignedBundle, SignError> {
    let signing_key = decode_signing_key(private_key).map_err(SignError::InvalidPrivateKey)?;
    let payload = canonicalize(rule_set);
    let payload_hash = sha256_hex(payload.as_bytes());
    let signature = signing_key.sign(payload.as_bytes());
    Ok(SignedBundle {
        version: BUNDLE_FORMAT_VERSION.to_string(),
        payload,
        payload_hash,
        signature: base64::engine::general_purpose::STANDARD.encode(signature.to_bytes()),
        public_key_id: public_key_id.to_string(),
        signed_at: Utc::now(),
    })
}

/// Parse the canonical payload back into JSON.
pub fn parse_bundle_payload(bundle: &SignedBundle) -> Result<serde_json::Value, BundleFormatError> {
    serde_json::from_str(&bundle.payload).map_err(|e| BundleFormatError::InvalidPayload(e.to_string()))
}

pub(crate) fn decode_signature(bundle: &SignedBundle) -> Result<Signature, BundleFormatError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&bundle.signature)
        .map_err(|_| BundleFormatError::InvalidSignatureEncoding)?;
    let array: [u8; 64] = bytes
        .try_into()
        .map_err(|_| BundleFormatError::InvalidSignatureEncoding)?;
    Ok(Signature::from_bytes(&array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_signing_key_pair;
    use serde_json::json;

    #[test]
    fn payload_is_canonical_json() {
        let pair = generate_signing_key_pair();
        let bundle =
            create_signed_bundle(&json!({"b": 1, "a": 2}), &pair.private_key, &pair.key_id).unwrap();
        assert_eq!(bundle.payload, r#"{"a":2,"b":1}"#);
        assert_eq!(bundle.payload_hash, sha256_hex(bundle.payload.as_bytes()));
    }

    #[test]
    fn parse_payload_round_trips() {
        let pair = generate_signing_key_pair();
        let value = json!({"rules": [1, 2, 3], "name": "n"});
        let bundle = create_signed_bundle(&value, &pair.private_key, &pair.key_id).unwrap();
        assert_eq!(parse_bundle_payload(&bundle).unwrap(), value);
    }

    #[test]
    fn on_disk_format_uses_camel_case_and_ignores_unknown_fields() {
        let pair = generate_signing_key_pair();
        let bundle = create_signed_bundle(&json!({}), &pair.private_key, &pair.key_id).unwrap();
        let text = bundle.to_json_pretty();
        assert!(text.contains("\"payloadHash\""));
        assert!(text.contains("\"publicKeyId\""));
        assert!(text.contains("\"signedAt\""));

        let with_extra = text.replacen('{', "{\n  \"futureField\": 1,", 1);
        assert_eq!(SignedBundle::from_json(&with_extra).unwrap(), bundle);
    }

    #[test]
    fn missing_required_field_is_a_format_error() {
        let err = SignedBundle::from_json(r#"{"version":"1.0","payload":"{}"}"#).unwrap_err();
        assert!(matches!(err, BundleFormatError::Malformed(_)));
    }
}
