//! License validation port.
//!
//! The billing/account backend owns licenses. The control plane only asks it
//! to turn a license key into a [`LicenseInfo`].

use crate::entities::LicenseInfo;
use crate::errors::ErrorCategory;
use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by the license service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LicenseError {
    /// Key is unknown or malformed.
    #[error("license key rejected")]
    Invalid,

    /// Key is known but lapsed.
    #[error("license expired at {expired_at}")]
    Expired {
        /// Expiry timestamp.
        expired_at: u64,
    },

    /// Service could not be reached.
    #[error("license service unavailable: {0}")]
    Unavailable(String),
}

impl LicenseError {
    /// Taxonomy class.
    pub fn category(&self) -> ErrorCategory {
        match self {
            LicenseError::Invalid | LicenseError::Expired { .. } => ErrorCategory::Entitlement,
            LicenseError::Unavailable(_) => ErrorCategory::Transient,
        }
    }

    /// Stable reason code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            LicenseError::Invalid => "license_invalid",
            LicenseError::Expired { .. } => "license_expired",
            LicenseError::Unavailable(_) => "license_unavailable",
        }
    }
}

/// Driven port to the external license validator.
#[async_trait]
pub trait LicenseValidator: Send + Sync {
    /// Resolve a license key to its entitlement.
    async fn validate(&self, license_key: &str) -> Result<LicenseInfo, LicenseError>;
}
