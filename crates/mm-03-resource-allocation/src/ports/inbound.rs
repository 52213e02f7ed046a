//! Driving port.

use crate::domain::{AllocationError, ResourceAllocation, ResourceRequest, Utilization};

/// Quota operations offered to admission and operators.
pub trait ResourceAllocationApi: Send + Sync {
    /// Validate and queue a request.
    fn request(&self, request: ResourceRequest) -> Result<String, AllocationError>;

    /// Return an allocation's quota.
    fn release(&self, allocation_id: &str) -> Result<ResourceAllocation, AllocationError>;

    /// Global pool snapshot.
    fn utilization(&self) -> Utilization;

    /// Allocation granted for a request, if any.
    fn allocation_for_request(&self, request_id: &str) -> Option<ResourceAllocation>;
}
