//! Ed25519 key generation and key-id derivation.
//!
//! Keys travel as base64-encoded DER (PKCS#8 for the private key, SPKI
//! for the public key). A key id is derived from the DER bytes of the
//! public key, not from its base64 encoding, so the same key always maps
//! to the same id no matter how the encoding was produced.

use crate::hash::sha256_hex;
use base64::Engine;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::RngCore;

/// How many leading hex characters of the public-key digest form a key id.
pub const KEY_ID_LEN: usize = 16;

pub struct GeneratedKeyPair {
    /// Base64-encoded PKCS#8 DER private key.
    pub private_key: String,
    /// Base64-encoded SPKI DER public key.
    pub public_key: String,
    /// First [`KEY_ID_LEN`] hex chars of SHA-256 over the public key DER bytes.
    pub key_id: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyDecodeError {
    #[error("key is not valid base64")]
    InvalidBase64,
    #[error("key bytes are not valid DER for an Ed25519 key")]
    InvalidDer,
}

/// Generate a fresh Ed25519 keypair and derive its key id.
pub fn generate_signing_key_pair() -> GeneratedKeyPair {
    let mut secret = [0u8; 32];
    rand::rng().fill_bytes(&mut secret);
    let signing_key = SigningKey::from_bytes(&secret);
    let verifying_key = signing_key.verifying_key();

    let private_der = signing_key
        .to_pkcs8_der()
        .expect("Ed25519 PKCS#8 encoding cannot fail");
    let public_der = verifying_key
        .to_public_key_der()
        .expect("Ed25519 SPKI encoding cannot fail");

    let b64 = base64::engine::general_purpose::STANDARD;
    GeneratedKeyPair {
        private_key: b64.encode(private_der.as_bytes()),
        public_key: b64.encode(public_der.as_bytes()),
        key_id: key_id_from_der(public_der.as_bytes()),
    }
}

/// Derive the key id for a base64-DER public key.
///
/// Hashes the decoded DER bytes; two differently-padded base64 encodings
/// of the same key therefore produce the same id.
pub fn derive_key_id(public_key: &str) -> Result<String, KeyDecodeError> {
    let der = base64::engine::general_purpose::STANDARD
        .decode(public_key)
        .map_err(|_| KeyDecodeError::InvalidBase64)?;
    // Validate before hashing so a truncated key can't acquire an id.
    VerifyingKey::from_public_key_der(&der).map_err(|_| KeyDecodeError::InvalidDer)?;
    Ok(key_id_from_der(&der))
}

fn key_id_from_der(der: &[u8]) -> String {
    let digest = sha256_hex(der);
    digest[..KEY_ID_LEN].to_string()
}

pub fn decode_signing_key(private_key: &str) -> Result<SigningKey, KeyDecodeError> {
    let der = base64::engine::general_purpose::STANDARD
        .decode(private_key)
        .map_err(|_| KeyDecodeError::InvalidBase64)?;
    SigningKey::from_pkcs8_der(&der).map_err(|_| KeyDecodeError::InvalidDer)
}

pub fn decode_verifying_key(public_key: &str) -> Result<VerifyingKey, KeyDecodeError> {
    let der = base64::engine::general_purpose::STANDARD
        .decode(public_key)
        .map_err(|_| KeyDecodeError::InvalidBase64)?;
    VerifyingKey::from_public_key_der(&der).map_err(|_| KeyDecodeError::InvalidDer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_id_is_sixteen_lowercase_hex_chars() {
        let pair = generate_signing_key_pair();
        assert_eq!(pair.key_id.len(), KEY_ID_LEN);
        assert!(pair
            .key_id
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn derive_key_id_matches_generated_id() {
        let pair = generate_signing_key_pair();
        assert_eq!(derive_key_id(&pair.public_key).unwrap(), pair.key_id);
    }

    #[test]
    fn keys_round_trip_through_base64_der() {
        let pair = generate_signing_key_pair();
        let signing = decode_signing_key(&pair.private_key).unwrap();
        let verifying = decode_verifying_key(&pair.public_key).unwrap();
        assert_eq!(signing.verifying_key(), verifying);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_verifying_key("not base64!!").is_err());
        assert!(decode_verifying_key("AAAA").is_err());
        assert!(derive_key_id("AAAA").is_err());
        assert!(decode_signing_key("AAAA").is_err());
    }
}
