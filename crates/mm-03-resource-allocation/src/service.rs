//! # Resource Allocation Service
//!
//! Thread-safe front end over [`ResourcePool`]. The periodic allocation and
//! maintenance passes are driven by the composition root.

use crate::domain::{
    AllocationError, AllocationPassReport, AllocatorConfig, MaintenanceReport,
    NetworkResourceProfile, PendingRequest, ResourceAllocation, ResourcePool, ResourceQuota,
    ResourceRequest, Utilization,
};
use crate::ports::ResourceAllocationApi;
use parking_lot::Mutex;
use shared_bus::{ControlPlaneEvent, EventPublisher};
use shared_types::TimeSource;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SUBSYSTEM: &str = "resource_allocation";

/// Arbitrates quota across networks.
pub struct ResourceAllocator {
    config: AllocatorConfig,
    time: Arc<dyn TimeSource>,
    events: Option<Arc<dyn EventPublisher>>,
    pool: Mutex<ResourcePool>,
}

impl ResourceAllocator {
    pub fn new(config: AllocatorConfig, time: Arc<dyn TimeSource>) -> Self {
        let pool = Mutex::new(ResourcePool::new(config.total));
        Self {
            config,
            time,
            events: None,
            pool,
        }
    }

    /// Publish allocation events on `events`.
    pub fn with_event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Register a network's base/peak envelope.
    pub fn register_network(&self, profile: NetworkResourceProfile) -> Result<(), AllocationError> {
        let network_id = profile.network_id.clone();
        let priority = profile.priority;
        self.pool.lock().register_network(profile)?;
        info!(subsystem = SUBSYSTEM, network_id = %network_id, ?priority, "Network registered");
        Ok(())
    }

    /// Move a network's ceiling between base and peak.
    pub fn update_scaling(&self, network_id: &str, factor: f64) -> Result<ResourceQuota, AllocationError> {
        let ceiling = self.pool.lock().update_scaling(network_id, factor)?;
        info!(
            subsystem = SUBSYSTEM,
            network_id = %network_id,
            factor,
            worker_ceiling = ceiling.worker_slots,
            client_ceiling = ceiling.client_slots,
            "Network scaling updated"
        );
        Ok(ceiling)
    }

    /// Validate and queue a request. Returns the request id.
    pub fn request(&self, request: ResourceRequest) -> Result<String, AllocationError> {
        let now = self.time.now();
        let mut pool = self.pool.lock();
        let verdict = pool.validate(&request, &self.config.tier_limits);
        if let Err(e) = verdict {
            drop(pool);
            warn!(
                subsystem = SUBSYSTEM,
                network_id = %request.network_id,
                requester_id = %request.requester_id,
                tier = %request.tier,
                reason = e.reason_code(),
                "Resource request rejected"
            );
            return Err(e);
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        debug!(
            subsystem = SUBSYSTEM,
            request_id = %request_id,
            network_id = %request.network_id,
            priority = ?request.priority,
            "Resource request queued"
        );
        pool.enqueue(PendingRequest {
            request_id: request_id.clone(),
            request,
            submitted_at: now,
            expires_at: now.saturating_add(self.config.request_timeout_ms),
        });
        Ok(request_id)
    }

    /// Withdraw a queued request.
    pub fn cancel_request(&self, request_id: &str) -> Result<(), AllocationError> {
        self.pool
            .lock()
            .cancel(request_id)
            .map(|_| ())
            .ok_or_else(|| AllocationError::RequestNotFound(request_id.to_string()))
    }

    /// One allocation pass with the configured strategy.
    pub fn run_allocation_pass(&self) -> AllocationPassReport {
        let now = self.time.now();
        let (report, granted, preempted) = {
            let mut pool = self.pool.lock();
            let report = pool.run_pass(now, self.config.strategy, self.config.allocation_ttl_ms);
            let lookup = |ids: &[String]| -> Vec<ResourceAllocation> {
                ids.iter().filter_map(|id| pool.allocation(id).cloned()).collect()
            };
            let granted = lookup(&report.granted);
            let preempted = lookup(&report.preempted);
            (report, granted, preempted)
        };

        for allocation in &preempted {
            warn!(
                subsystem = SUBSYSTEM,
                allocation_id = %allocation.allocation_id,
                network_id = %allocation.network_id,
                priority = ?allocation.priority,
                "Allocation preempted"
            );
            self.publish_released(allocation, "preempted");
        }
        for allocation in &granted {
            info!(
                subsystem = SUBSYSTEM,
                allocation_id = %allocation.allocation_id,
                request_id = %allocation.request_id,
                network_id = %allocation.network_id,
                partial = allocation.is_partial(),
                worker_slots = allocation.quota.worker_slots,
                client_slots = allocation.quota.client_slots,
                "Resources allocated"
            );
            self.publish(ControlPlaneEvent::ResourcesAllocated {
                allocation_id: allocation.allocation_id.clone(),
                network_id: allocation.network_id.clone(),
                worker_slots: allocation.quota.worker_slots,
                client_slots: allocation.quota.client_slots,
            });
        }
        if !report.granted.is_empty() || report.still_pending > 0 {
            debug!(
                subsystem = SUBSYSTEM,
                strategy = self.config.strategy.as_str(),
                granted = report.granted.len(),
                preempted = report.preempted.len(),
                pending = report.still_pending,
                "Allocation pass finished"
            );
        }
        report
    }

    /// Return an allocation's quota to the pool.
    pub fn release(&self, allocation_id: &str) -> Result<ResourceAllocation, AllocationError> {
        let now = self.time.now();
        let released = self.pool.lock().release(allocation_id, now)?;
        info!(
            subsystem = SUBSYSTEM,
            allocation_id = %allocation_id,
            network_id = %released.network_id,
            "Allocation released"
        );
        self.publish_released(&released, "released");
        Ok(released)
    }

    /// Expire allocations and requests past their deadlines.
    pub fn run_maintenance(&self) -> MaintenanceReport {
        let now = self.time.now();
        let (report, expired) = self
            .pool
            .lock()
            .expire(now, self.config.history_retention_ms);
        for allocation in &expired {
            self.publish_released(allocation, "expired");
        }
        if report != MaintenanceReport::default() {
            info!(
                subsystem = SUBSYSTEM,
                expired_allocations = report.expired_allocations,
                expired_requests = report.expired_requests,
                purged = report.purged,
                "Allocation maintenance"
            );
        }
        report
    }

    pub fn utilization(&self) -> Utilization {
        self.pool.lock().utilization()
    }

    pub fn allocation(&self, allocation_id: &str) -> Option<ResourceAllocation> {
        self.pool.lock().allocation(allocation_id).cloned()
    }

    pub fn allocation_for_request(&self, request_id: &str) -> Option<ResourceAllocation> {
        self.pool.lock().allocation_for_request(request_id).cloned()
    }

    pub fn allocations_for_network(&self, network_id: &str) -> Vec<ResourceAllocation> {
        self.pool.lock().allocations_for_network(network_id)
    }

    pub fn network_usage(&self, network_id: &str) -> ResourceQuota {
        self.pool.lock().network_usage(network_id)
    }

    pub fn pending_requests(&self) -> usize {
        self.pool.lock().pending().len()
    }

    fn publish_released(&self, allocation: &ResourceAllocation, reason: &str) {
        self.publish(ControlPlaneEvent::ResourcesReleased {
            allocation_id: allocation.allocation_id.clone(),
            network_id: allocation.network_id.clone(),
            reason: reason.to_string(),
        });
    }

    fn publish(&self, event: ControlPlaneEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

impl ResourceAllocationApi for ResourceAllocator {
    fn request(&self, request: ResourceRequest) -> Result<String, AllocationError> {
        ResourceAllocator::request(self, request)
    }

    fn release(&self, allocation_id: &str) -> Result<ResourceAllocation, AllocationError> {
        ResourceAllocator::release(self, allocation_id)
    }

    fn utilization(&self) -> Utilization {
        ResourceAllocator::utilization(self)
    }

    fn allocation_for_request(&self, request_id: &str) -> Option<ResourceAllocation> {
        ResourceAllocator::allocation_for_request(self, request_id)
    }
}
