//! Key management errors.

use super::entities::KeyStatus;
use shared_crypto::CryptoError;
use shared_types::{ErrorCategory, StorageError};
use thiserror::Error;

/// Failures of key lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum KeyError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("key {key_id} is {status}")]
    InvalidKeyState { key_id: String, status: KeyStatus },

    #[error("model {model_id} already has active key {key_id}")]
    ActiveKeyExists { model_id: String, key_id: String },

    #[error("another rotation is in progress")]
    RotationInProgress,

    #[error("key {key_id} already rotated to {successor}")]
    AlreadyRotated { key_id: String, successor: String },

    #[error("license does not match key {key_id}")]
    LicenseMismatch { key_id: String },

    #[error("key {key_id} is not bound to this machine or no longer valid")]
    BindingInvalid { key_id: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("stored material for key {key_id} is corrupt")]
    CorruptMaterial { key_id: String },

    #[error("key derivation failed: {0}")]
    Derivation(#[from] CryptoError),

    #[error("key derivation task failed: {0}")]
    TaskFailed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl KeyError {
    /// Taxonomy class.
    pub fn category(&self) -> ErrorCategory {
        match self {
            KeyError::KeyNotFound(_)
            | KeyError::InvalidKeyState { .. }
            | KeyError::ActiveKeyExists { .. }
            | KeyError::AlreadyRotated { .. }
            | KeyError::InvalidRequest(_) => ErrorCategory::Validation,
            KeyError::LicenseMismatch { .. } => ErrorCategory::Entitlement,
            KeyError::BindingInvalid { .. } => ErrorCategory::Identity,
            KeyError::RotationInProgress => ErrorCategory::Transient,
            KeyError::CorruptMaterial { .. } => ErrorCategory::Integrity,
            KeyError::Derivation(_) | KeyError::TaskFailed(_) => ErrorCategory::Fatal,
            KeyError::Storage(e) => e.category(),
        }
    }

    /// Stable reason code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            KeyError::KeyNotFound(_) => "key_not_found",
            KeyError::InvalidKeyState { .. } => "key_invalid_state",
            KeyError::ActiveKeyExists { .. } => "key_active_exists",
            KeyError::RotationInProgress => "key_rotation_in_progress",
            KeyError::AlreadyRotated { .. } => "key_already_rotated",
            KeyError::LicenseMismatch { .. } => "key_license_mismatch",
            KeyError::BindingInvalid { .. } => "key_binding_invalid",
            KeyError::InvalidRequest(_) => "key_invalid_request",
            KeyError::CorruptMaterial { .. } => "key_corrupt_material",
            KeyError::Derivation(_) => "key_derivation_failed",
            KeyError::TaskFailed(_) => "key_task_failed",
            KeyError::Storage(e) => e.reason_code(),
        }
    }
}
