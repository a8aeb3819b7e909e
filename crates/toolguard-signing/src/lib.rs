//! Signed rule bundle format and Ed25519 verification.
//!
//! A rule set is canonicalized (sorted-key JSON), hashed with SHA-256,
//! and signed with Ed25519 before distribution; `toolguard-loader`
//! verifies bundles at load time according to its per-file signing-mode
//! policy. Key ids are derived from the DER bytes of the public key.

mod bundle;
mod canonical;
mod hash;
mod keys;
mod verify;

pub use bundle::{
    create_signed_bundle, parse_bundle_payload, BundleFormatError, SignError, SignedBundle,
    BUNDLE_FORMAT_VERSION,
};
pub use canonical::canonicalize;
pub use hash::sha256_hex;
pub use keys::{
    decode_signing_key, decode_verifying_key, derive_key_id, generate_signing_key_pair,
    GeneratedKeyPair, KeyDecodeError, KEY_ID_LEN,
};
pub use verify::{
    verify_bundle, BundlePinError, SignatureVerificationError, SigningConfig, VerifyError,
};
