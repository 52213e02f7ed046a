//! Requests, allocations and network profiles.

use super::quota::{ResourceDimension, ResourceQuota};
use serde::{Deserialize, Serialize};
use shared_types::{LicenseTier, NetworkId, NodeId, Timestamp};

/// Urgency of a request. Lower numeric value is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestPriority {
    Critical = 1,
    High = 2,
    Normal = 3,
    Low = 4,
}

impl RequestPriority {
    /// Numeric rank, 1 = most urgent.
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Strictly less urgent than `other`.
    pub fn is_below(self, other: RequestPriority) -> bool {
        self.rank() > other.rank()
    }
}

/// Lifecycle of a granted allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationStatus {
    Active,
    Released,
    Expired,
    Preempted,
}

impl AllocationStatus {
    /// Whether the allocation still holds quota.
    pub fn holds_quota(self) -> bool {
        self == AllocationStatus::Active
    }
}

/// A bid for resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub network_id: NetworkId,
    pub requester_id: NodeId,
    pub tier: LicenseTier,
    pub priority: RequestPriority,
    pub quota: ResourceQuota,
    /// Accept less than asked under fair-share arbitration.
    pub allow_partial: bool,
}

/// A queued request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub request_id: String,
    pub request: ResourceRequest,
    pub submitted_at: Timestamp,
    pub expires_at: Timestamp,
}

impl PendingRequest {
    /// Past its timeout.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// A granted reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub allocation_id: String,
    pub request_id: String,
    pub network_id: NetworkId,
    pub requester_id: NodeId,
    pub priority: RequestPriority,
    /// Quota actually held.
    pub quota: ResourceQuota,
    /// What the request asked for.
    pub requested: ResourceQuota,
    pub granted_at: Timestamp,
    pub expires_at: Timestamp,
    pub status: AllocationStatus,
    pub ended_at: Option<Timestamp>,
}

impl ResourceAllocation {
    /// Granted less than asked.
    pub fn is_partial(&self) -> bool {
        self.quota != self.requested
    }
}

/// Base and peak envelope of one network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkResourceProfile {
    pub network_id: NetworkId,
    pub base: ResourceQuota,
    pub peak: ResourceQuota,
    pub priority: RequestPriority,
    /// Multiplier on `base`, bounded by `peak`.
    pub scaling_factor: f64,
}

impl NetworkResourceProfile {
    /// Profile with a scaling factor of 1.
    pub fn new(
        network_id: impl Into<NetworkId>,
        base: ResourceQuota,
        peak: ResourceQuota,
        priority: RequestPriority,
    ) -> Self {
        Self {
            network_id: network_id.into(),
            base,
            peak,
            priority,
            scaling_factor: 1.0,
        }
    }

    /// `min(peak, base × factor)`, never below base.
    pub fn effective_ceiling(&self) -> ResourceQuota {
        self.base
            .scale(self.scaling_factor)
            .max(&self.base)
            .min(&self.peak)
    }
}

/// Usage of one dimension of the global pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionUsage {
    pub resource: ResourceDimension,
    pub total: u64,
    pub allocated: u64,
    pub available: u64,
    pub percent: f64,
}

/// Snapshot of the global pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utilization {
    pub dimensions: Vec<DimensionUsage>,
    pub pending_requests: usize,
    pub active_allocations: usize,
}

impl Utilization {
    /// Usage of one dimension.
    pub fn dimension(&self, resource: ResourceDimension) -> Option<&DimensionUsage> {
        self.dimensions.iter().find(|d| d.resource == resource)
    }
}

/// Outcome of one allocation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationPassReport {
    /// Allocations created, in grant order.
    pub granted: Vec<String>,
    /// Allocations preempted to make room.
    pub preempted: Vec<String>,
    /// Requests still queued.
    pub still_pending: usize,
}

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub expired_allocations: usize,
    pub expired_requests: usize,
    /// Ended allocations dropped from history.
    pub purged: usize,
}
