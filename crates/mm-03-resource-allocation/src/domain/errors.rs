//! Allocation errors.

use super::quota::ResourceDimension;
use shared_types::{ErrorCategory, LicenseTier};
use thiserror::Error;

/// Failures of requests, releases and profile updates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AllocationError {
    #[error("network {0} is not registered")]
    UnknownNetwork(String),

    #[error("network {0} is already registered")]
    NetworkExists(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("{dimension} request {requested} exceeds system total {total}")]
    ExceedsSystemCapacity {
        dimension: ResourceDimension,
        requested: u64,
        total: u64,
    },

    #[error("{tier} tier allows at most {limit} {dimension}, requested {requested}")]
    TierLimitExceeded {
        tier: LicenseTier,
        dimension: ResourceDimension,
        requested: u64,
        limit: u64,
    },

    #[error("{dimension} request {requested} exceeds network peak {peak}")]
    ExceedsNetworkPeak {
        dimension: ResourceDimension,
        requested: u64,
        peak: u64,
    },

    #[error("request {0} not found")]
    RequestNotFound(String),

    #[error("allocation {0} not found")]
    AllocationNotFound(String),

    #[error("allocation {allocation_id} is {status:?}")]
    NotActive {
        allocation_id: String,
        status: super::entities::AllocationStatus,
    },
}

impl AllocationError {
    /// Taxonomy class.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AllocationError::ExceedsSystemCapacity { .. }
            | AllocationError::TierLimitExceeded { .. }
            | AllocationError::ExceedsNetworkPeak { .. } => ErrorCategory::Capacity,
            _ => ErrorCategory::Validation,
        }
    }

    /// Stable reason code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AllocationError::UnknownNetwork(_) => "alloc_unknown_network",
            AllocationError::NetworkExists(_) => "alloc_network_exists",
            AllocationError::InvalidRequest(_) => "alloc_invalid_request",
            AllocationError::InvalidProfile(_) => "alloc_invalid_profile",
            AllocationError::ExceedsSystemCapacity { .. } => "alloc_exceeds_system",
            AllocationError::TierLimitExceeded { .. } => "alloc_tier_limit",
            AllocationError::ExceedsNetworkPeak { .. } => "alloc_exceeds_network_peak",
            AllocationError::RequestNotFound(_) => "alloc_request_not_found",
            AllocationError::AllocationNotFound(_) => "alloc_not_found",
            AllocationError::NotActive { .. } => "alloc_not_active",
        }
    }
}
