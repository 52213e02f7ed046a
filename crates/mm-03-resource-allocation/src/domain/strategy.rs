//! Conflict resolution for requests the greedy pass cannot satisfy.

use super::quota::ResourceQuota;
use serde::{Deserialize, Serialize};

/// Arbitration applied to the residue of an allocation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Preempt strictly less urgent allocations when that makes a request fit.
    #[default]
    PriorityBased,
    /// Split what is left between requests that accept partial grants.
    FairShare,
    /// Leave the residue queued in arrival order.
    FirstComeFirstServed,
}

impl ConflictStrategy {
    /// Label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictStrategy::PriorityBased => "priority_based",
            ConflictStrategy::FairShare => "fair_share",
            ConflictStrategy::FirstComeFirstServed => "fcfs",
        }
    }
}

/// Share for the next of `candidates_left` requests.
///
/// `remaining` must already reflect every earlier grant of the same pass, so
/// the shares handed out in one pass never sum past the pool.
pub fn fair_share(ask: &ResourceQuota, remaining: &ResourceQuota, candidates_left: usize) -> ResourceQuota {
    ask.min(&remaining.div_floor(candidates_left as u64))
}
