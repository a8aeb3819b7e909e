//! Errors the loader can raise. Parse failures for individual `.yaml`/
//! `.yml` files are never fatal (logged and skipped); only a
//! signing-required bundle failure propagates, per the signing-mode
//! policy table.

use toolguard_signing::{BundleFormatError, VerifyError};

#[derive(thiserror::Error, Debug)]
pub enum LoaderError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("signed bundle {path} is malformed: {source}")]
    BundleFormat {
        path: String,
        #[source]
        source: BundleFormatError,
    },
    #[error("signed bundle {path} failed verification: {source}")]
    BundleVerification {
        path: String,
        #[source]
        source: VerifyError,
    },
    #[error("signed bundle {path} payload is not a valid rule set: {source}")]
    BundlePayload {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("rule set in {path} has an unsupported version: {version}")]
    UnsupportedRuleSetVersion { path: String, version: String },
}

pub type LoaderResult<T> = Result<T, LoaderError>;
