//! Bundle verification: trusted-key lookup, signature check, pinning.
//!
//! Verification is two-stage: the payload hash is recomputed first (the
//! signature covers the payload, not the hash field, so a tampered hash
//! would otherwise go unnoticed), then the Ed25519 signature is checked
//! against a key from the trust set. Pin checks run last, after the
//! signature is known good.

use crate::bundle::{decode_signature, BundleFormatError, SignedBundle, BUNDLE_FORMAT_VERSION};
use crate::hash::sha256_hex;
use crate::keys::decode_verifying_key;
use ed25519_dalek::Verifier;
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SignatureVerificationError {
    #[error("payload hash does not match the payload: bundle may be tampered with")]
    PayloadHashMismatch,
    #[error("bundle key id {key_id:?} is not in trusted public keys")]
    UntrustedKey { key_id: String },
    #[error("trusted key {key_id:?} could not be decoded")]
    MalformedTrustedKey { key_id: String },
    #[error("signature does not verify against any acceptable trusted key")]
    InvalidSignature,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BundlePinError {
    #[error("bundle version {actual:?} does not match pinned version {expected:?}")]
    VersionMismatch { expected: String, actual: String },
    #[error("bundle payload hash {actual:?} does not match pinned hash {expected:?}")]
    HashMismatch { expected: String, actual: String },
}

/// Any way bundle verification can fail, grouped by which stage failed.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error(transparent)]
    Format(#[from] BundleFormatError),
    #[error(transparent)]
    Signature(#[from] SignatureVerificationError),
    #[error(transparent)]
    Pin(#[from] BundlePinError),
}

/// Trust configuration for verifying loaded bundles.
///
/// `public_keys` maps key ids to base64-DER public keys. By default the
/// bundle's declared key id must resolve to a trusted key and that exact
/// key must verify. `allow_rotation` is an explicit operator opt-in: when
/// the declared id has no entry, every trusted key is tried and the first
/// that verifies is accepted. Never enable it as a standing default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SigningConfig {
    pub public_keys: BTreeMap<String, String>,
    pub allow_rotation: bool,
    pub pinned_version: Option<String>,
    pub pinned_hash: Option<String>,
}

impl SigningConfig {
    pub fn with_key(key_id: impl Into<String>, public_key: impl Into<String>) -> Self {
        let mut public_keys = BTreeMap::new();
        public_keys.insert(key_id.into(), public_key.into());
        Self {
            public_keys,
            ..Default::default()
        }
    }
}

/// Verify `bundle` against `config`.
pub fn verify_bundle(bundle: &SignedBundle, config: &SigningConfig) -> Result<(), VerifyError> {
    if bundle.version != BUNDLE_FORMAT_VERSION {
        return Err(BundleFormatError::UnsupportedVersion(bundle.version.clone()).into());
    }

    if sha256_hex(bundle.payload.as_bytes()) != bundle.payload_hash {
        return Err(SignatureVerificationError::PayloadHashMismatch.into());
    }

    let signature = decode_signature(bundle)?;

    match config.public_keys.get(&bundle.public_key_id) {
        Some(encoded) => {
            let key = decode_verifying_key(encoded).map_err(|_| {
                SignatureVerificationError::MalformedTrustedKey {
                    key_id: bundle.public_key_id.clone(),
                }
            })?;
            key.verify(bundle.payload.as_bytes(), &signature)
                .map_err(|_| SignatureVerificationError::InvalidSignature)?;
        }
        None if config.allow_rotation => {
            let mut verified = false;
            for (key_id, encoded) in &config.public_keys {
                let key = decode_verifying_key(encoded).map_err(|_| {
                    SignatureVerificationError::MalformedTrustedKey {
                        key_id: key_id.clone(),
                    }
                })?;
                if key.verify(bundle.payload.as_bytes(), &signature).is_ok() {
                    verified = true;
                    break;
                }
            }
            if !verified {
                return Err(SignatureVerificationError::InvalidSignature.into());
            }
        }
        None => {
            return Err(SignatureVerificationError::UntrustedKey {
                key_id: bundle.public_key_id.clone(),
            }
            .into());
        }
    }

    if let Some(expected) = &config.pinned_version {
        if expected != &bundle.version {
            return Err(BundlePinError::VersionMismatch {
                expected: expected.clone(),
                actual: bundle.version.clone(),
            }
            .into());
        }
    }
    if let Some(expected) = &config.pinned_hash {
        if expected != &bundle.payload_hash {
            return Err(BundlePinError::HashMismatch {
                expected: expected.clone(),
                actual: bundle.payload_hash.clone(),
            }
            .into());
        }
    }

    Ok(())
}
