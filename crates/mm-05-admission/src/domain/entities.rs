//! Join requests, decisions and network policies.

use serde::{Deserialize, Serialize};
use shared_types::{AdminId, LicenseTier, NetworkId, NodeId, NodeRole, Timestamp};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Lifecycle of a join request. Every status but `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        self != RequestStatus::Pending
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
            RequestStatus::Expired => "EXPIRED",
            RequestStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Urgency of a join request. Listing puts higher priorities first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// What the requester says about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterInfo {
    pub role: Option<NodeRole>,
    pub hostname: String,
    pub gpu_memory_mb: u64,
    /// Serialized node certificate, checked at submission when present.
    pub certificate: Option<Vec<u8>>,
    /// Free-form capability flags passed through untouched.
    pub capabilities: BTreeMap<String, String>,
}

/// Access granted with an approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub inference: bool,
    pub model_upload: bool,
    pub max_sessions: u32,
    pub priority_access: bool,
}

impl Permissions {
    /// Inference is always allowed; upload, concurrency and priority scale
    /// with the tier.
    pub fn for_tier(tier: LicenseTier) -> Self {
        match tier {
            LicenseTier::Free => Self {
                inference: true,
                model_upload: false,
                max_sessions: 1,
                priority_access: false,
            },
            LicenseTier::Pro => Self {
                inference: true,
                model_upload: true,
                max_sessions: 5,
                priority_access: false,
            },
            LicenseTier::Enterprise => Self {
                inference: true,
                model_upload: true,
                max_sessions: 50,
                priority_access: true,
            },
        }
    }
}

/// An admin's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub request_id: String,
    pub admin_id: AdminId,
    pub approved: bool,
    pub notes: String,
    pub decided_at: Timestamp,
    /// Present on approval only.
    pub permissions: Option<Permissions>,
    /// Resource reservation made on approval, if a reserver is wired.
    pub allocation_id: Option<String>,
}

/// A node's bid to join a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub request_id: String,
    pub requester_id: NodeId,
    pub requester_address: String,
    pub network_id: NetworkId,
    pub requester_info: RequesterInfo,
    pub priority: JoinPriority,
    pub license_tier: LicenseTier,
    /// SHA-256 hex of the license key.
    pub license_hash: String,
    pub license_expires_at: Timestamp,
    pub identity_verified: bool,
    /// 32 random bytes, hex.
    pub security_token: String,
    pub status: RequestStatus,
    pub submitted_at: Timestamp,
    pub expires_at: Timestamp,
    /// Submission order, breaks listing ties.
    pub sequence: u64,
    pub resolved_at: Option<Timestamp>,
    pub decision: Option<ApprovalDecision>,
    pub cancel_reason: Option<String>,
}

impl JoinRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Move to a terminal status.
    pub(crate) fn resolve(&mut self, status: RequestStatus, now: Timestamp) {
        self.status = status;
        self.resolved_at = Some(now);
    }
}

/// Inbound submission. The license key is used once and never stored.
#[derive(Debug, Clone)]
pub struct SubmitJoinRequest {
    pub requester_id: NodeId,
    pub requester_address: String,
    pub network_id: NetworkId,
    pub license_key: String,
    pub requester_info: RequesterInfo,
    pub priority: JoinPriority,
    /// Overrides the configured request lifetime.
    pub ttl_ms: Option<u64>,
}

/// Admission rules of one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPolicy {
    pub network_id: NetworkId,
    pub required_tier: LicenseTier,
    pub admins: BTreeSet<AdminId>,
    /// Refuse approval of requests without a verified certificate.
    pub require_verified_identity: bool,
}

impl NetworkPolicy {
    pub fn new(network_id: impl Into<NetworkId>, required_tier: LicenseTier) -> Self {
        Self {
            network_id: network_id.into(),
            required_tier,
            admins: BTreeSet::new(),
            require_verified_identity: false,
        }
    }

    pub fn with_admin(mut self, admin_id: impl Into<AdminId>) -> Self {
        self.admins.insert(admin_id.into());
        self
    }

    pub fn with_verified_identity(mut self) -> Self {
        self.require_verified_identity = true;
        self
    }

    /// A tier is admitted iff it is at least the required tier.
    pub fn can_admit(&self, tier: LicenseTier) -> bool {
        tier.satisfies(self.required_tier)
    }
}

/// Outcome of [`crate::AdmissionController::sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub purged: usize,
}

/// Request counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionStats {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub expired: usize,
    pub cancelled: usize,
}

impl AdmissionStats {
    pub(crate) fn count(&mut self, status: RequestStatus) {
        match status {
            RequestStatus::Pending => self.pending += 1,
            RequestStatus::Approved => self.approved += 1,
            RequestStatus::Rejected => self.rejected += 1,
            RequestStatus::Expired => self.expired += 1,
            RequestStatus::Cancelled => self.cancelled += 1,
        }
    }
}
