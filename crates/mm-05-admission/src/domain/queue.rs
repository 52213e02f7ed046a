//! Listing order of pending requests.

use super::entities::{JoinPriority, JoinRequest};
use std::cmp::Ordering;

/// Higher priority first, then earlier submission, then submission order.
pub fn listing_order(a: &JoinRequest, b: &JoinRequest) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then(a.submitted_at.cmp(&b.submitted_at))
        .then(a.sequence.cmp(&b.sequence))
}

/// Pending requests matching the filters, in listing order.
pub fn pending_listing<'a>(
    requests: impl IntoIterator<Item = &'a JoinRequest>,
    network: Option<&str>,
    priority: Option<JoinPriority>,
) -> Vec<JoinRequest> {
    let mut selected: Vec<JoinRequest> = requests
        .into_iter()
        .filter(|r| r.is_pending())
        .filter(|r| network.map_or(true, |n| r.network_id == n))
        .filter(|r| priority.map_or(true, |p| r.priority == p))
        .cloned()
        .collect();
    selected.sort_by(listing_order);
    selected
}
