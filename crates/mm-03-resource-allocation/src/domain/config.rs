//! Allocator configuration.

use super::quota::ResourceQuota;
use super::strategy::ConflictStrategy;
use shared_types::{LicenseTier, HOUR_MS, SECOND_MS};

/// Hard slot caps for one license tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierCaps {
    pub max_worker_slots: u64,
    pub max_client_slots: u64,
}

/// Slot caps per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub free: TierCaps,
    pub pro: TierCaps,
    pub enterprise: TierCaps,
}

impl TierLimits {
    /// Caps for `tier`.
    pub fn caps(&self, tier: LicenseTier) -> TierCaps {
        match tier {
            LicenseTier::Free => self.free,
            LicenseTier::Pro => self.pro,
            LicenseTier::Enterprise => self.enterprise,
        }
    }
}

impl Default for TierLimits {
    fn default() -> Self {
        Self {
            free: TierCaps {
                max_worker_slots: 2,
                max_client_slots: 3,
            },
            pro: TierCaps {
                max_worker_slots: 10,
                max_client_slots: 20,
            },
            enterprise: TierCaps {
                max_worker_slots: 100,
                max_client_slots: 1000,
            },
        }
    }
}

/// Resource allocator settings.
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// System-wide pool.
    pub total: ResourceQuota,
    /// Arbitration applied to requests the greedy pass cannot satisfy.
    pub strategy: ConflictStrategy,
    /// Lifetime of a granted allocation, ms.
    pub allocation_ttl_ms: u64,
    /// Lifetime of a queued request, ms.
    pub request_timeout_ms: u64,
    /// How long ended allocations stay queryable, ms.
    pub history_retention_ms: u64,
    /// Per-tier slot caps.
    pub tier_limits: TierLimits,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            total: ResourceQuota {
                cpu_millis: 64_000,
                memory_mb: 256 * 1024,
                gpu_memory_mb: 4 * 80 * 1024,
                bandwidth_mbps: 10_000,
                worker_slots: 200,
                client_slots: 2_000,
            },
            strategy: ConflictStrategy::PriorityBased,
            allocation_ttl_ms: 24 * HOUR_MS,
            request_timeout_ms: 300 * SECOND_MS,
            history_retention_ms: HOUR_MS,
            tier_limits: TierLimits::default(),
        }
    }
}

impl AllocatorConfig {
    /// Small pool for tests.
    pub fn for_testing() -> Self {
        Self {
            total: ResourceQuota {
                cpu_millis: 8_000,
                memory_mb: 16_384,
                gpu_memory_mb: 24_576,
                bandwidth_mbps: 1_000,
                worker_slots: 12,
                client_slots: 40,
            },
            request_timeout_ms: 10 * SECOND_MS,
            ..Self::default()
        }
    }

    /// Same settings with another strategy.
    pub fn with_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}
