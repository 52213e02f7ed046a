//! Resource quota vector.
//!
//! Every dimension is an unsigned integer so that conservation holds exactly.
//! CPU is expressed in millicores.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One dimension of a [`ResourceQuota`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceDimension {
    CpuMillis,
    MemoryMb,
    GpuMemoryMb,
    BandwidthMbps,
    WorkerSlots,
    ClientSlots,
}

impl ResourceDimension {
    /// All dimensions in reporting order.
    pub const ALL: [ResourceDimension; 6] = [
        ResourceDimension::CpuMillis,
        ResourceDimension::MemoryMb,
        ResourceDimension::GpuMemoryMb,
        ResourceDimension::BandwidthMbps,
        ResourceDimension::WorkerSlots,
        ResourceDimension::ClientSlots,
    ];

    /// Label used in metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceDimension::CpuMillis => "cpu_millis",
            ResourceDimension::MemoryMb => "memory_mb",
            ResourceDimension::GpuMemoryMb => "gpu_memory_mb",
            ResourceDimension::BandwidthMbps => "bandwidth_mbps",
            ResourceDimension::WorkerSlots => "worker_slots",
            ResourceDimension::ClientSlots => "client_slots",
        }
    }
}

impl fmt::Display for ResourceDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-negative resource vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub cpu_millis: u64,
    pub memory_mb: u64,
    pub gpu_memory_mb: u64,
    pub bandwidth_mbps: u64,
    pub worker_slots: u64,
    pub client_slots: u64,
}

impl ResourceQuota {
    /// The empty quota.
    pub const ZERO: ResourceQuota = ResourceQuota {
        cpu_millis: 0,
        memory_mb: 0,
        gpu_memory_mb: 0,
        bandwidth_mbps: 0,
        worker_slots: 0,
        client_slots: 0,
    };

    /// Value of one dimension.
    pub fn get(&self, dim: ResourceDimension) -> u64 {
        match dim {
            ResourceDimension::CpuMillis => self.cpu_millis,
            ResourceDimension::MemoryMb => self.memory_mb,
            ResourceDimension::GpuMemoryMb => self.gpu_memory_mb,
            ResourceDimension::BandwidthMbps => self.bandwidth_mbps,
            ResourceDimension::WorkerSlots => self.worker_slots,
            ResourceDimension::ClientSlots => self.client_slots,
        }
    }

    fn slot(&mut self, dim: ResourceDimension) -> &mut u64 {
        match dim {
            ResourceDimension::CpuMillis => &mut self.cpu_millis,
            ResourceDimension::MemoryMb => &mut self.memory_mb,
            ResourceDimension::GpuMemoryMb => &mut self.gpu_memory_mb,
            ResourceDimension::BandwidthMbps => &mut self.bandwidth_mbps,
            ResourceDimension::WorkerSlots => &mut self.worker_slots,
            ResourceDimension::ClientSlots => &mut self.client_slots,
        }
    }

    /// Build a quota dimension by dimension.
    pub fn from_fn(mut f: impl FnMut(ResourceDimension) -> u64) -> Self {
        let mut q = Self::ZERO;
        for dim in ResourceDimension::ALL {
            *q.slot(dim) = f(dim);
        }
        q
    }

    /// True if every dimension is zero.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// True if every dimension of `self` is `<=` the matching one in `limit`.
    pub fn fits_within(&self, limit: &ResourceQuota) -> bool {
        ResourceDimension::ALL
            .iter()
            .all(|&d| self.get(d) <= limit.get(d))
    }

    /// First dimension in which `self` exceeds `limit`.
    pub fn first_excess(&self, limit: &ResourceQuota) -> Option<ResourceDimension> {
        ResourceDimension::ALL
            .into_iter()
            .find(|&d| self.get(d) > limit.get(d))
    }

    /// Per-dimension subtraction, clamped at zero.
    pub fn saturating_sub(&self, other: &ResourceQuota) -> Self {
        Self::from_fn(|d| self.get(d).saturating_sub(other.get(d)))
    }

    /// Per-dimension addition, `None` on overflow.
    pub fn checked_add(&self, other: &ResourceQuota) -> Option<Self> {
        let mut out = Self::ZERO;
        for d in ResourceDimension::ALL {
            *out.slot(d) = self.get(d).checked_add(other.get(d))?;
        }
        Some(out)
    }

    /// Per-dimension addition, clamped at `u64::MAX`.
    pub fn saturating_add(&self, other: &ResourceQuota) -> Self {
        Self::from_fn(|d| self.get(d).saturating_add(other.get(d)))
    }

    /// Per-dimension minimum.
    pub fn min(&self, other: &ResourceQuota) -> Self {
        Self::from_fn(|d| self.get(d).min(other.get(d)))
    }

    /// Per-dimension maximum.
    pub fn max(&self, other: &ResourceQuota) -> Self {
        Self::from_fn(|d| self.get(d).max(other.get(d)))
    }

    /// Scale every dimension by `factor`, rounding down.
    pub fn scale(&self, factor: f64) -> Self {
        Self::from_fn(|d| {
            let scaled = (self.get(d) as f64 * factor).floor();
            if scaled >= u64::MAX as f64 {
                u64::MAX
            } else if scaled <= 0.0 {
                0
            } else {
                scaled as u64
            }
        })
    }

    /// Divide every dimension by `n`, rounding down.
    pub fn div_floor(&self, n: u64) -> Self {
        if n == 0 {
            return Self::ZERO;
        }
        Self::from_fn(|d| self.get(d) / n)
    }
}
