//! Failures of the primitives in this crate.
//!
//! Messages never include key bytes or plaintext.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Wrong key, or the sealed payload was altered.
    #[error("authenticated decryption failed")]
    DecryptionFailed,

    #[error("sealed payload is {actual} bytes, shorter than nonce and tag ({minimum})")]
    CiphertextTooShort { minimum: usize, actual: usize },

    #[error("key is {actual} bytes, expected {expected}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("signature does not match")]
    SignatureVerificationFailed,

    #[error("signature bytes are malformed")]
    InvalidSignatureFormat,

    #[error("public key is malformed")]
    InvalidPublicKey,

    #[error("private key is malformed")]
    InvalidPrivateKey,

    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),
}

impl CryptoError {
    /// True when the input was altered or truncated rather than misused.
    pub fn is_tampering(&self) -> bool {
        matches!(
            self,
            CryptoError::DecryptionFailed
                | CryptoError::CiphertextTooShort { .. }
                | CryptoError::SignatureVerificationFailed
        )
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            CryptoError::EncryptionFailed(_) => "crypto_encryption_failed",
            CryptoError::DecryptionFailed => "crypto_decryption_failed",
            CryptoError::CiphertextTooShort { .. } => "crypto_ciphertext_too_short",
            CryptoError::InvalidKeyLength { .. } => "crypto_invalid_key_length",
            CryptoError::SignatureVerificationFailed => "crypto_signature_mismatch",
            CryptoError::InvalidSignatureFormat => "crypto_malformed_signature",
            CryptoError::InvalidPublicKey => "crypto_malformed_public_key",
            CryptoError::InvalidPrivateKey => "crypto_malformed_private_key",
            CryptoError::KeyDerivationFailed(_) => "crypto_kdf_failed",
        }
    }
}
