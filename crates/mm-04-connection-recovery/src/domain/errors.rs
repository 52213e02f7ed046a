//! Recovery errors.

use shared_types::{ErrorCategory, Timestamp};
use thiserror::Error;

/// Failures of registration, reporting and reconnect probes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("connection {0} is not registered")]
    UnknownConnection(String),

    #[error("connection {0} is already registered")]
    AlreadyRegistered(String),

    #[error("circuit open until {until}")]
    CircuitOpen { until: Timestamp },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A reconnect attempt failed.
    #[error("reconnect failed: {0}")]
    ProbeFailed(String),
}

impl RecoveryError {
    /// Taxonomy class.
    pub fn category(&self) -> ErrorCategory {
        match self {
            RecoveryError::CircuitOpen { .. } | RecoveryError::ProbeFailed(_) => {
                ErrorCategory::Transient
            }
            _ => ErrorCategory::Validation,
        }
    }

    /// Stable reason code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            RecoveryError::UnknownConnection(_) => "recovery_unknown_connection",
            RecoveryError::AlreadyRegistered(_) => "recovery_already_registered",
            RecoveryError::CircuitOpen { .. } => "recovery_circuit_open",
            RecoveryError::InvalidRequest(_) => "recovery_invalid_request",
            RecoveryError::ProbeFailed(_) => "recovery_probe_failed",
        }
    }
}
