//! Composition-root errors.

use mm_01_key_management::KeyError;
use mm_02_authentication::AuthError;
use mm_03_resource_allocation::AllocationError;
use mm_04_connection_recovery::RecoveryError;
use mm_05_admission::AdmissionError;
use mm_06_secure_transfer::TransferError;
use shared_crypto::CryptoError;
use shared_types::{ErrorCategory, StorageError};
use thiserror::Error;

use super::config::ConfigError;
use crate::adapters::LicenseImportError;

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("certificate authority unusable: {0}")]
    Authority(String),

    #[error(transparent)]
    Licenses(#[from] LicenseImportError),

    #[error(transparent)]
    Keys(#[from] KeyError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl ControlPlaneError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ControlPlaneError::Config(_) => ErrorCategory::Validation,
            ControlPlaneError::Storage(e) => e.category(),
            ControlPlaneError::Crypto(e) if e.is_tampering() => ErrorCategory::Integrity,
            ControlPlaneError::Crypto(_) | ControlPlaneError::Authority(_) => ErrorCategory::Fatal,
            ControlPlaneError::Licenses(LicenseImportError::Storage(e)) => e.category(),
            ControlPlaneError::Licenses(_) => ErrorCategory::Validation,
            ControlPlaneError::Keys(e) => e.category(),
            ControlPlaneError::Auth(e) => e.category(),
            ControlPlaneError::Allocation(e) => e.category(),
            ControlPlaneError::Recovery(e) => e.category(),
            ControlPlaneError::Admission(e) => e.category(),
            ControlPlaneError::Transfer(e) => e.category(),
        }
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            ControlPlaneError::Config(_) => "config_invalid",
            ControlPlaneError::Storage(e) => e.reason_code(),
            ControlPlaneError::Crypto(e) => e.reason_code(),
            ControlPlaneError::Authority(_) => "authority_unusable",
            ControlPlaneError::Licenses(LicenseImportError::Storage(e)) => e.reason_code(),
            ControlPlaneError::Licenses(_) => "license_import_failed",
            ControlPlaneError::Keys(e) => e.reason_code(),
            ControlPlaneError::Auth(e) => e.reason_code(),
            ControlPlaneError::Allocation(e) => e.reason_code(),
            ControlPlaneError::Recovery(e) => e.reason_code(),
            ControlPlaneError::Admission(e) => e.reason_code(),
            ControlPlaneError::Transfer(e) => e.reason_code(),
        }
    }
}
