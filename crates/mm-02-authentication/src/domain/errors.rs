//! Authentication errors.
//!
//! Each verification step fails with its own variant so callers and logs can
//! tell a forged certificate from an expired one.

use shared_crypto::CryptoError;
use shared_types::{ErrorCategory, StorageError, Timestamp};
use thiserror::Error;

/// Failures of issuance, verification and challenges.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed certificate: {0}")]
    Malformed(String),

    #[error("certificate not issued by this authority")]
    UntrustedIssuer,

    #[error("certificate expired at {not_after}")]
    Expired { not_after: Timestamp },

    #[error("certificate not valid before {not_before}")]
    NotYetValid { not_before: Timestamp },

    #[error("signature does not match certificate key")]
    SignatureMismatch,

    #[error("certificate {serial} revoked")]
    Revoked { serial: String },

    #[error("certificate belongs to {actual}, not {expected}")]
    NodeMismatch { expected: String, actual: String },

    #[error("certificate {0} unknown to this authority")]
    UnknownCertificate(String),

    #[error("no certificates for node {0}")]
    UnknownNode(String),

    #[error("challenge {0} not found")]
    ChallengeNotFound(String),

    #[error("challenge expired")]
    ChallengeExpired,

    #[error("challenge exhausted after {attempts} attempts")]
    ChallengeExhausted { attempts: u32 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("crypto failure: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Taxonomy class.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::InvalidRequest(_) => ErrorCategory::Validation,
            AuthError::Crypto(_) => ErrorCategory::Fatal,
            AuthError::Storage(e) => e.category(),
            _ => ErrorCategory::Identity,
        }
    }

    /// Stable reason code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AuthError::Malformed(_) => "auth_malformed",
            AuthError::UntrustedIssuer => "auth_untrusted_issuer",
            AuthError::Expired { .. } => "auth_expired",
            AuthError::NotYetValid { .. } => "auth_not_yet_valid",
            AuthError::SignatureMismatch => "auth_signature_mismatch",
            AuthError::Revoked { .. } => "auth_revoked",
            AuthError::NodeMismatch { .. } => "auth_node_mismatch",
            AuthError::UnknownCertificate(_) => "auth_unknown_certificate",
            AuthError::UnknownNode(_) => "auth_unknown_node",
            AuthError::ChallengeNotFound(_) => "auth_challenge_not_found",
            AuthError::ChallengeExpired => "auth_challenge_expired",
            AuthError::ChallengeExhausted { .. } => "auth_challenge_exhausted",
            AuthError::InvalidRequest(_) => "auth_invalid_request",
            AuthError::Crypto(_) => "auth_crypto",
            AuthError::Storage(e) => e.reason_code(),
        }
    }
}
