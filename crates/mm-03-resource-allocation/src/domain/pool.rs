//! # Resource Pool
//!
//! Accounting core of the allocator. Pure and synchronous: the caller passes
//! the current time in and holds the lock around it.
//!
//! ## Invariants Enforced
//!
//! - `allocated + available == total` per dimension (`grant()` only after `can_grant()`)
//! - Network usage never exceeds the effective ceiling at grant time
//! - Only ACTIVE allocations hold quota (`end()` returns it exactly once)

use super::config::TierLimits;
use super::entities::{
    AllocationPassReport, AllocationStatus, DimensionUsage, MaintenanceReport,
    NetworkResourceProfile, PendingRequest, ResourceAllocation, ResourceRequest, Utilization,
};
use super::errors::AllocationError;
use super::quota::{ResourceDimension, ResourceQuota};
use super::strategy::{fair_share, ConflictStrategy};
use shared_types::Timestamp;
use std::collections::HashMap;

/// Global pool, registered networks, queue and allocations.
#[derive(Debug)]
pub struct ResourcePool {
    total: ResourceQuota,
    allocated: ResourceQuota,
    networks: HashMap<String, NetworkResourceProfile>,
    network_usage: HashMap<String, ResourceQuota>,
    pending: Vec<PendingRequest>,
    allocations: HashMap<String, ResourceAllocation>,
}

impl ResourcePool {
    /// Empty pool with `total` capacity.
    pub fn new(total: ResourceQuota) -> Self {
        Self {
            total,
            allocated: ResourceQuota::ZERO,
            networks: HashMap::new(),
            network_usage: HashMap::new(),
            pending: Vec::new(),
            allocations: HashMap::new(),
        }
    }

    pub fn total(&self) -> ResourceQuota {
        self.total
    }

    pub fn allocated(&self) -> ResourceQuota {
        self.allocated
    }

    pub fn available(&self) -> ResourceQuota {
        self.total.saturating_sub(&self.allocated)
    }

    // =========================================================================
    // NETWORKS
    // =========================================================================

    /// Add a network profile.
    pub fn register_network(&mut self, profile: NetworkResourceProfile) -> Result<(), AllocationError> {
        if profile.network_id.is_empty() {
            return Err(AllocationError::InvalidProfile("network id is empty".into()));
        }
        if !profile.base.fits_within(&profile.peak) {
            return Err(AllocationError::InvalidProfile("base exceeds peak".into()));
        }
        validate_factor(profile.scaling_factor)?;
        if self.networks.contains_key(&profile.network_id) {
            return Err(AllocationError::NetworkExists(profile.network_id));
        }
        self.network_usage
            .insert(profile.network_id.clone(), ResourceQuota::ZERO);
        self.networks.insert(profile.network_id.clone(), profile);
        Ok(())
    }

    /// Change a network's scaling factor. Returns the new ceiling.
    pub fn update_scaling(&mut self, network_id: &str, factor: f64) -> Result<ResourceQuota, AllocationError> {
        validate_factor(factor)?;
        let profile = self
            .networks
            .get_mut(network_id)
            .ok_or_else(|| AllocationError::UnknownNetwork(network_id.to_string()))?;
        profile.scaling_factor = factor;
        Ok(profile.effective_ceiling())
    }

    pub fn network(&self, network_id: &str) -> Option<&NetworkResourceProfile> {
        self.networks.get(network_id)
    }

    /// Quota held by ACTIVE allocations of a network.
    pub fn network_usage(&self, network_id: &str) -> ResourceQuota {
        self.network_usage
            .get(network_id)
            .copied()
            .unwrap_or(ResourceQuota::ZERO)
    }

    // =========================================================================
    // REQUESTS
    // =========================================================================

    /// Reject requests that can never be satisfied.
    pub fn validate(&self, request: &ResourceRequest, limits: &TierLimits) -> Result<(), AllocationError> {
        let profile = self
            .networks
            .get(&request.network_id)
            .ok_or_else(|| AllocationError::UnknownNetwork(request.network_id.clone()))?;
        if request.requester_id.is_empty() {
            return Err(AllocationError::InvalidRequest("requester id is empty".into()));
        }
        if request.quota.is_zero() {
            return Err(AllocationError::InvalidRequest("quota is empty".into()));
        }

        if let Some(dimension) = request.quota.first_excess(&self.total) {
            return Err(AllocationError::ExceedsSystemCapacity {
                dimension,
                requested: request.quota.get(dimension),
                total: self.total.get(dimension),
            });
        }

        let caps = limits.caps(request.tier);
        for (dimension, limit) in [
            (ResourceDimension::WorkerSlots, caps.max_worker_slots),
            (ResourceDimension::ClientSlots, caps.max_client_slots),
        ] {
            let requested = request.quota.get(dimension);
            if requested > limit {
                return Err(AllocationError::TierLimitExceeded {
                    tier: request.tier,
                    dimension,
                    requested,
                    limit,
                });
            }
        }

        if let Some(dimension) = request.quota.first_excess(&profile.peak) {
            return Err(AllocationError::ExceedsNetworkPeak {
                dimension,
                requested: request.quota.get(dimension),
                peak: profile.peak.get(dimension),
            });
        }
        Ok(())
    }

    /// Queue a validated request.
    pub fn enqueue(&mut self, pending: PendingRequest) {
        self.pending.push(pending);
    }

    /// Drop a queued request.
    pub fn cancel(&mut self, request_id: &str) -> Option<PendingRequest> {
        let idx = self.pending.iter().position(|p| p.request_id == request_id)?;
        Some(self.pending.remove(idx))
    }

    /// Queued requests in arrival order.
    pub fn pending(&self) -> &[PendingRequest] {
        &self.pending
    }

    // =========================================================================
    // ALLOCATION PASS
    // =========================================================================

    /// Grant what fits, then arbitrate the residue with `strategy`.
    pub fn run_pass(
        &mut self,
        now: Timestamp,
        strategy: ConflictStrategy,
        allocation_ttl_ms: u64,
    ) -> AllocationPassReport {
        let mut report = AllocationPassReport::default();
        let mut queue = std::mem::take(&mut self.pending);
        queue.sort_by_key(|p| (p.request.priority, p.submitted_at));

        let mut residue = Vec::new();
        for pending in queue {
            if !pending.is_expired(now)
                && self.can_grant(&pending.request.network_id, &pending.request.quota)
            {
                let quota = pending.request.quota;
                report
                    .granted
                    .push(self.grant(&pending, quota, now, allocation_ttl_ms));
            } else {
                residue.push(pending);
            }
        }

        let mut residue = match strategy {
            ConflictStrategy::PriorityBased => {
                self.resolve_by_priority(residue, now, allocation_ttl_ms, &mut report)
            }
            ConflictStrategy::FairShare => {
                self.resolve_by_fair_share(residue, now, allocation_ttl_ms, &mut report)
            }
            ConflictStrategy::FirstComeFirstServed => residue,
        };

        residue.sort_by_key(|p| p.submitted_at);
        report.still_pending = residue.len();
        self.pending = residue;
        report
    }

    fn resolve_by_priority(
        &mut self,
        residue: Vec<PendingRequest>,
        now: Timestamp,
        ttl: u64,
        report: &mut AllocationPassReport,
    ) -> Vec<PendingRequest> {
        let mut still = Vec::new();
        for pending in residue {
            if pending.is_expired(now) {
                still.push(pending);
                continue;
            }
            match self.plan_preemption(&pending) {
                Some(victims) => {
                    for victim in victims {
                        if self.end(&victim, AllocationStatus::Preempted, now).is_some() {
                            report.preempted.push(victim);
                        }
                    }
                    let quota = pending.request.quota;
                    report.granted.push(self.grant(&pending, quota, now, ttl));
                }
                None => still.push(pending),
            }
        }
        still
    }

    /// Smallest prefix of less urgent allocations whose release makes the
    /// request fit. Victims that free nothing the request is short of are
    /// skipped.
    fn plan_preemption(&self, pending: &PendingRequest) -> Option<Vec<String>> {
        let request = &pending.request;
        let ceiling = self.networks.get(&request.network_id)?.effective_ceiling();
        let usage = self.network_usage(&request.network_id);
        let available = self.available();

        let mut candidates: Vec<&ResourceAllocation> = self
            .allocations
            .values()
            .filter(|a| a.status.holds_quota() && a.priority.is_below(request.priority))
            .collect();
        // Least urgent first, newest first within a priority.
        candidates.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.granted_at.cmp(&a.granted_at))
                .then(b.allocation_id.cmp(&a.allocation_id))
        });

        let mut freed = ResourceQuota::ZERO;
        let mut freed_in_network = ResourceQuota::ZERO;
        let mut victims = Vec::new();
        for candidate in candidates {
            let global_short = request.quota.saturating_sub(&available.saturating_add(&freed));
            let network_short = usage
                .saturating_sub(&freed_in_network)
                .saturating_add(&request.quota)
                .saturating_sub(&ceiling);
            let same_network = candidate.network_id == request.network_id;
            let helps = ResourceDimension::ALL.iter().any(|&d| {
                candidate.quota.get(d) > 0
                    && (global_short.get(d) > 0 || (same_network && network_short.get(d) > 0))
            });
            if !helps {
                continue;
            }

            victims.push(candidate.allocation_id.clone());
            freed = freed.saturating_add(&candidate.quota);
            if same_network {
                freed_in_network = freed_in_network.saturating_add(&candidate.quota);
            }

            let fits_pool = request.quota.fits_within(&available.saturating_add(&freed));
            let fits_network = usage
                .saturating_sub(&freed_in_network)
                .saturating_add(&request.quota)
                .fits_within(&ceiling);
            if fits_pool && fits_network {
                return Some(victims);
            }
        }
        None
    }

    fn resolve_by_fair_share(
        &mut self,
        residue: Vec<PendingRequest>,
        now: Timestamp,
        ttl: u64,
        report: &mut AllocationPassReport,
    ) -> Vec<PendingRequest> {
        let mut candidates_left = residue
            .iter()
            .filter(|p| p.request.allow_partial && !p.is_expired(now))
            .count();
        let mut still = Vec::new();
        for pending in residue {
            if !pending.request.allow_partial || pending.is_expired(now) {
                still.push(pending);
                continue;
            }
            let remaining = self
                .available()
                .min(&self.headroom(&pending.request.network_id));
            let share = fair_share(&pending.request.quota, &remaining, candidates_left);
            candidates_left -= 1;
            if share.is_zero() {
                still.push(pending);
            } else {
                report.granted.push(self.grant(&pending, share, now, ttl));
            }
        }
        still
    }

    fn headroom(&self, network_id: &str) -> ResourceQuota {
        match self.networks.get(network_id) {
            Some(profile) => profile
                .effective_ceiling()
                .saturating_sub(&self.network_usage(network_id)),
            None => ResourceQuota::ZERO,
        }
    }

    fn can_grant(&self, network_id: &str, quota: &ResourceQuota) -> bool {
        quota.fits_within(&self.available()) && quota.fits_within(&self.headroom(network_id))
    }

    fn grant(
        &mut self,
        pending: &PendingRequest,
        quota: ResourceQuota,
        now: Timestamp,
        ttl: u64,
    ) -> String {
        let allocation = ResourceAllocation {
            allocation_id: uuid::Uuid::new_v4().to_string(),
            request_id: pending.request_id.clone(),
            network_id: pending.request.network_id.clone(),
            requester_id: pending.request.requester_id.clone(),
            priority: pending.request.priority,
            quota,
            requested: pending.request.quota,
            granted_at: now,
            expires_at: now.saturating_add(ttl),
            status: AllocationStatus::Active,
            ended_at: None,
        };
        self.allocated = self.allocated.saturating_add(&quota);
        let usage = self
            .network_usage
            .entry(allocation.network_id.clone())
            .or_default();
        *usage = usage.saturating_add(&quota);

        let id = allocation.allocation_id.clone();
        self.allocations.insert(id.clone(), allocation);
        id
    }

    /// Move an ACTIVE allocation to `status` and return its quota.
    fn end(
        &mut self,
        allocation_id: &str,
        status: AllocationStatus,
        now: Timestamp,
    ) -> Option<ResourceAllocation> {
        let allocation = self.allocations.get_mut(allocation_id)?;
        if !allocation.status.holds_quota() {
            return None;
        }
        allocation.status = status;
        allocation.ended_at = Some(now);
        let quota = allocation.quota;
        let network_id = allocation.network_id.clone();
        let snapshot = allocation.clone();

        self.allocated = self.allocated.saturating_sub(&quota);
        if let Some(usage) = self.network_usage.get_mut(&network_id) {
            *usage = usage.saturating_sub(&quota);
        }
        Some(snapshot)
    }

    // =========================================================================
    // RELEASE AND MAINTENANCE
    // =========================================================================

    /// Return an allocation's quota to the pool.
    pub fn release(&mut self, allocation_id: &str, now: Timestamp) -> Result<ResourceAllocation, AllocationError> {
        let status = self
            .allocations
            .get(allocation_id)
            .map(|a| a.status)
            .ok_or_else(|| AllocationError::AllocationNotFound(allocation_id.to_string()))?;
        self.end(allocation_id, AllocationStatus::Released, now)
            .ok_or_else(|| AllocationError::NotActive {
                allocation_id: allocation_id.to_string(),
                status,
            })
    }

    /// Expire allocations and requests past their deadlines and purge old
    /// history. Returns the expired allocations alongside the counts.
    pub fn expire(
        &mut self,
        now: Timestamp,
        history_retention_ms: u64,
    ) -> (MaintenanceReport, Vec<ResourceAllocation>) {
        let due: Vec<String> = self
            .allocations
            .values()
            .filter(|a| a.status.holds_quota() && now >= a.expires_at)
            .map(|a| a.allocation_id.clone())
            .collect();
        let expired: Vec<ResourceAllocation> = due
            .iter()
            .filter_map(|id| self.end(id, AllocationStatus::Expired, now))
            .collect();

        let before = self.pending.len();
        self.pending.retain(|p| !p.is_expired(now));
        let expired_requests = before - self.pending.len();

        let before = self.allocations.len();
        self.allocations.retain(|_, a| match a.ended_at {
            Some(ended) => now < ended.saturating_add(history_retention_ms),
            None => true,
        });
        let purged = before - self.allocations.len();

        let report = MaintenanceReport {
            expired_allocations: expired.len(),
            expired_requests,
            purged,
        };
        (report, expired)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn allocation(&self, allocation_id: &str) -> Option<&ResourceAllocation> {
        self.allocations.get(allocation_id)
    }

    pub fn allocation_for_request(&self, request_id: &str) -> Option<&ResourceAllocation> {
        self.allocations.values().find(|a| a.request_id == request_id)
    }

    /// Allocations of a network, oldest first.
    pub fn allocations_for_network(&self, network_id: &str) -> Vec<ResourceAllocation> {
        let mut out: Vec<ResourceAllocation> = self
            .allocations
            .values()
            .filter(|a| a.network_id == network_id)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.granted_at);
        out
    }

    pub fn utilization(&self) -> Utilization {
        let available = self.available();
        let dimensions = ResourceDimension::ALL
            .into_iter()
            .map(|resource| {
                let total = self.total.get(resource);
                let allocated = self.allocated.get(resource);
                let percent = if total == 0 {
                    0.0
                } else {
                    allocated as f64 / total as f64 * 100.0
                };
                DimensionUsage {
                    resource,
                    total,
                    allocated,
                    available: available.get(resource),
                    percent,
                }
            })
            .collect();
        Utilization {
            dimensions,
            pending_requests: self.pending.len(),
            active_allocations: self
                .allocations
                .values()
                .filter(|a| a.status.holds_quota())
                .count(),
        }
    }
}

fn validate_factor(factor: f64) -> Result<(), AllocationError> {
    if factor.is_finite() && factor > 0.0 {
        Ok(())
    } else {
        Err(AllocationError::InvalidProfile(format!(
            "scaling factor {factor} must be positive"
        )))
    }
}
