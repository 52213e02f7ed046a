use async_trait::async_trait;
use mm_03_resource_allocation::{
    RequestPriority, ResourceAllocator, ResourceQuota, ResourceRequest,
};
use mm_05_admission::{JoinPriority, JoinRequest, Permissions, ResourceReserver};
use shared_types::NodeRole;
use std::sync::Arc;
use tracing::{debug, warn};

const SUBSYSTEM: &str = "node_runtime";

/// Sizing of the quota reserved for an admitted node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationPolicy {
    /// Reserved for a worker node.
    pub worker: ResourceQuota,
    /// Reserved per permitted session of any other node.
    pub per_session: ResourceQuota,
    /// Accept a reduced grant under fair-share arbitration.
    pub allow_partial: bool,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            worker: ResourceQuota {
                cpu_millis: 1_000,
                memory_mb: 4_096,
                bandwidth_mbps: 100,
                worker_slots: 1,
                ..ResourceQuota::ZERO
            },
            per_session: ResourceQuota {
                cpu_millis: 250,
                memory_mb: 512,
                bandwidth_mbps: 10,
                client_slots: 1,
                ..ResourceQuota::ZERO
            },
            allow_partial: false,
        }
    }
}

impl ReservationPolicy {
    /// Quota for a node of `role` holding `permissions`.
    pub fn quota_for(&self, role: Option<NodeRole>, permissions: &Permissions) -> ResourceQuota {
        match role {
            Some(NodeRole::Worker) => self.worker,
            _ => {
                let sessions = u64::from(permissions.max_sessions.max(1));
                ResourceQuota::from_fn(|dim| self.per_session.get(dim).saturating_mul(sessions))
            }
        }
    }
}

/// Admission's reservation step, answered by the resource allocator.
///
/// The request is queued and an allocation pass runs immediately. A request
/// the pass cannot satisfy is withdrawn so it never lingers in the queue.
pub struct AllocatorReserver {
    allocator: Arc<ResourceAllocator>,
    policy: ReservationPolicy,
}

impl AllocatorReserver {
    pub fn new(allocator: Arc<ResourceAllocator>) -> Self {
        Self {
            allocator,
            policy: ReservationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReservationPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Urgent joins outrank everything already allocated.
pub fn request_priority(priority: JoinPriority) -> RequestPriority {
    match priority {
        JoinPriority::Urgent => RequestPriority::Critical,
        JoinPriority::High => RequestPriority::High,
        JoinPriority::Normal => RequestPriority::Normal,
        JoinPriority::Low => RequestPriority::Low,
    }
}

#[async_trait]
impl ResourceReserver for AllocatorReserver {
    async fn reserve(&self, request: &JoinRequest, permissions: &Permissions) -> Result<String, String> {
        let resource_request = ResourceRequest {
            network_id: request.network_id.clone(),
            requester_id: request.requester_id.clone(),
            tier: request.license_tier,
            priority: request_priority(request.priority),
            quota: self.policy.quota_for(request.requester_info.role, permissions),
            allow_partial: self.policy.allow_partial,
        };
        let request_id = self
            .allocator
            .request(resource_request)
            .map_err(|e| e.reason_code().to_string())?;

        self.allocator.run_allocation_pass();
        match self.allocator.allocation_for_request(&request_id) {
            Some(allocation) => {
                debug!(
                    subsystem = SUBSYSTEM,
                    join_request = %request.request_id,
                    allocation_id = %allocation.allocation_id,
                    "Reservation granted"
                );
                Ok(allocation.allocation_id)
            }
            None => {
                if let Err(e) = self.allocator.cancel_request(&request_id) {
                    warn!(subsystem = SUBSYSTEM, request_id = %request_id, reason = e.reason_code(), "Withdraw failed");
                }
                Err("alloc_insufficient_capacity".to_string())
            }
        }
    }

    async fn release(&self, allocation_id: &str) -> Result<(), String> {
        self.allocator
            .release(allocation_id)
            .map(|_| ())
            .map_err(|e| e.reason_code().to_string())
    }
}
