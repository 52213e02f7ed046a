//! Admission errors.

use super::entities::RequestStatus;
use shared_types::{ErrorCategory, LicenseError, LicenseTier, StorageError, Timestamp};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("network {0} is already registered")]
    NetworkExists(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("pending queue is full ({capacity} requests)")]
    QueueFull { capacity: usize },

    #[error("requester {requester_id} is submitting too fast")]
    RateLimited { requester_id: String },

    #[error("requester already has pending request {request_id} for this network")]
    DuplicateRequest { request_id: String },

    #[error("license rejected: {0}")]
    License(#[from] LicenseError),

    #[error("license expired at {expired_at}")]
    LicenseExpired { expired_at: Timestamp },

    #[error("network requires {required} but license is {actual}")]
    InsufficientTier {
        required: LicenseTier,
        actual: LicenseTier,
    },

    #[error("identity check failed: {0}")]
    IdentityRejected(String),

    #[error("network {network_id} requires a verified identity")]
    IdentityRequired { network_id: String },

    #[error("join request not found: {0}")]
    RequestNotFound(String),

    #[error("join request {request_id} is {status}")]
    NotPending {
        request_id: String,
        status: RequestStatus,
    },

    #[error("join request {0} has expired")]
    RequestExpired(String),

    #[error("admin {admin_id} has no authority over {network_id}")]
    Unauthorized { admin_id: String, network_id: String },

    #[error("a decision on {0} is already in progress")]
    DecisionInProgress(String),

    #[error("resource reservation failed: {reason}")]
    ReservationFailed { reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AdmissionError {
    /// Taxonomy class.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AdmissionError::UnknownNetwork(_)
            | AdmissionError::NetworkExists(_)
            | AdmissionError::InvalidRequest(_)
            | AdmissionError::DuplicateRequest { .. }
            | AdmissionError::RequestNotFound(_)
            | AdmissionError::NotPending { .. }
            | AdmissionError::RequestExpired(_)
            | AdmissionError::Unauthorized { .. } => ErrorCategory::Validation,
            AdmissionError::QueueFull { .. }
            | AdmissionError::RateLimited { .. }
            | AdmissionError::ReservationFailed { .. } => ErrorCategory::Capacity,
            AdmissionError::License(e) => e.category(),
            AdmissionError::LicenseExpired { .. } | AdmissionError::InsufficientTier { .. } => {
                ErrorCategory::Entitlement
            }
            AdmissionError::IdentityRejected(_) | AdmissionError::IdentityRequired { .. } => {
                ErrorCategory::Identity
            }
            AdmissionError::DecisionInProgress(_) => ErrorCategory::Transient,
            AdmissionError::Storage(e) => e.category(),
        }
    }

    /// Stable reason code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AdmissionError::UnknownNetwork(_) => "admission_unknown_network",
            AdmissionError::NetworkExists(_) => "admission_network_exists",
            AdmissionError::InvalidRequest(_) => "admission_invalid_request",
            AdmissionError::QueueFull { .. } => "admission_queue_full",
            AdmissionError::RateLimited { .. } => "admission_rate_limited",
            AdmissionError::DuplicateRequest { .. } => "admission_duplicate_request",
            AdmissionError::License(e) => e.reason_code(),
            AdmissionError::LicenseExpired { .. } => "license_expired",
            AdmissionError::InsufficientTier { .. } => "admission_insufficient_tier",
            AdmissionError::IdentityRejected(_) => "admission_identity_rejected",
            AdmissionError::IdentityRequired { .. } => "admission_identity_required",
            AdmissionError::RequestNotFound(_) => "admission_request_not_found",
            AdmissionError::NotPending { .. } => "admission_not_pending",
            AdmissionError::RequestExpired(_) => "admission_request_expired",
            AdmissionError::Unauthorized { .. } => "admission_unauthorized",
            AdmissionError::DecisionInProgress(_) => "admission_decision_in_progress",
            AdmissionError::ReservationFailed { .. } => "admission_reservation_failed",
            AdmissionError::Storage(e) => e.reason_code(),
        }
    }
}
