//! # Error Taxonomy
//!
//! Every subsystem error maps into one [`ErrorCategory`] so that monitoring can
//! act on failures without parsing messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure class shared by all subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or oversized input, unknown network/admin.
    Validation,
    /// License tier insufficient or license binding mismatch.
    Entitlement,
    /// Untrusted/expired certificate, bad signature, failed challenge.
    Identity,
    /// Quota or queue exhausted.
    Capacity,
    /// Checksum mismatch.
    Integrity,
    /// Network failure or timeout; retried locally.
    Transient,
    /// Unrecoverable; abort with cause.
    Fatal,
}

impl ErrorCategory {
    /// Classes that a component may retry locally. Integrity failures on a
    /// transferred block are re-sent with a fresh nonce.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCategory::Transient | ErrorCategory::Integrity)
    }
}

/// Errors from the key/value storage port.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Underlying I/O failure.
    #[error("storage I/O error: {message}")]
    Io {
        /// Error description.
        message: String,
    },

    /// Stored record could not be encoded or decoded.
    #[error("storage serialization error in {collection}/{key}: {message}")]
    Serialization {
        /// Collection name.
        collection: String,
        /// Record key.
        key: String,
        /// Error description.
        message: String,
    },

    /// Collection or key name is not a safe path component.
    #[error("invalid storage name: {0}")]
    InvalidName(String),

    /// Another process holds the storage directory.
    #[error("storage directory locked: {0}")]
    Locked(String),
}

impl StorageError {
    /// Storage failures abort the calling operation.
    pub fn category(&self) -> ErrorCategory {
        match self {
            StorageError::InvalidName(_) => ErrorCategory::Validation,
            _ => ErrorCategory::Fatal,
        }
    }

    /// Stable reason code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            StorageError::Io { .. } => "storage_io",
            StorageError::Serialization { .. } => "storage_serialization",
            StorageError::InvalidName(_) => "storage_invalid_name",
            StorageError::Locked(_) => "storage_locked",
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io {
            message: e.to_string(),
        }
    }
}
