//! # Capacity Scenarios
//!
//! Tier slot caps are enforced before a request is queued, released quota
//! returns to the pool exactly once, and fair-share arbitration never hands
//! out more than the pool has left after earlier grants in the same pass.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use mm_03_resource_allocation::{
        AllocationStatus, AllocatorConfig, ConflictStrategy, NetworkResourceProfile,
        RequestPriority, ResourceAllocator, ResourceDimension, ResourceQuota, ResourceRequest,
    };
    use shared_types::{ErrorCategory, LicenseTier, MockTimeSource, NodeRole};

    use crate::fixtures::{join_request, network_quota, TestPlane, ADMIN, T0};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn workers(n: u64) -> ResourceQuota {
        ResourceQuota {
            cpu_millis: 250 * n,
            memory_mb: 512 * n,
            worker_slots: n,
            ..ResourceQuota::ZERO
        }
    }

    fn request(network_id: &str, requester: &str, tier: LicenseTier, quota: ResourceQuota) -> ResourceRequest {
        ResourceRequest {
            network_id: network_id.into(),
            requester_id: requester.into(),
            tier,
            priority: RequestPriority::Normal,
            quota,
            allow_partial: false,
        }
    }

    fn available(allocator: &ResourceAllocator, dimension: ResourceDimension) -> u64 {
        allocator.utilization().dimension(dimension).unwrap().available
    }

    /// Allocator whose single network may use the whole pool.
    fn fair_share_allocator() -> ResourceAllocator {
        let config = AllocatorConfig::for_testing().with_strategy(ConflictStrategy::FairShare);
        let total = config.total;
        let allocator = ResourceAllocator::new(config, Arc::new(MockTimeSource::new(T0)));
        allocator
            .register_network(NetworkResourceProfile::new(
                "shared",
                total,
                total,
                RequestPriority::Normal,
            ))
            .unwrap();
        allocator
    }

    fn assert_conserved(allocator: &ResourceAllocator) {
        for usage in allocator.utilization().dimensions {
            assert_eq!(
                usage.allocated + usage.available,
                usage.total,
                "{} is not conserved",
                usage.resource.as_str()
            );
        }
    }

    // =============================================================================
    // FREE TIER: CAP, GRANT, RELEASE
    // =============================================================================

    #[test]
    fn test_free_node_over_cap_rejected_then_allowed_amount_granted() {
        let env = TestPlane::new().unwrap();
        env.register_network("free-net", LicenseTier::Free, network_quota(), false)
            .unwrap();
        let allocator = &env.plane.allocator;
        let before = available(allocator, ResourceDimension::WorkerSlots);

        let err = allocator
            .request(request("free-net", "node-a", LicenseTier::Free, workers(3)))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Capacity);
        assert_eq!(err.reason_code(), "alloc_tier_limit");
        assert_eq!(allocator.pending_requests(), 0);
        assert_eq!(available(allocator, ResourceDimension::WorkerSlots), before);

        let request_id = allocator
            .request(request("free-net", "node-a", LicenseTier::Free, workers(2)))
            .unwrap();
        let report = allocator.run_allocation_pass();
        assert_eq!(report.granted.len(), 1);
        let allocation = allocator.allocation_for_request(&request_id).unwrap();
        assert_eq!(available(allocator, ResourceDimension::WorkerSlots), before - 2);

        let released = allocator.release(&allocation.allocation_id).unwrap();
        assert_eq!(released.status, AllocationStatus::Released);
        assert_eq!(available(allocator, ResourceDimension::WorkerSlots), before);
        assert_conserved(allocator);

        // Quota comes back once only.
        assert!(allocator.release(&allocation.allocation_id).is_err());
        assert_eq!(available(allocator, ResourceDimension::WorkerSlots), before);
    }

    #[tokio::test]
    async fn test_approved_worker_holds_one_slot_until_released() {
        let env = TestPlane::new().unwrap();
        env.grant_license("lic-free", LicenseTier::Free).unwrap();
        env.register_network("free-net", LicenseTier::Free, network_quota(), false)
            .unwrap();
        let plane = &env.plane;
        let before = available(&plane.allocator, ResourceDimension::WorkerSlots);

        let request = plane
            .admission
            .submit(join_request("worker-1", "free-net", "lic-free", NodeRole::Worker, None))
            .await
            .unwrap();
        let decision = plane
            .admission
            .decide(&request.request_id, ADMIN, true, "")
            .await
            .unwrap();

        let allocation_id = decision.allocation_id.unwrap();
        let allocation = plane.allocator.allocation(&allocation_id).unwrap();
        assert_eq!(allocation.network_id, "free-net");
        assert_eq!(allocation.quota.worker_slots, 1);
        assert_eq!(available(&plane.allocator, ResourceDimension::WorkerSlots), before - 1);

        plane.allocator.release(&allocation_id).unwrap();
        assert_eq!(available(&plane.allocator, ResourceDimension::WorkerSlots), before);
    }

    #[tokio::test]
    async fn test_full_network_refuses_reservation() {
        let env = TestPlane::new().unwrap();
        env.grant_license("lic-free", LicenseTier::Free).unwrap();
        // Room for one worker's memory only.
        let tight = ResourceQuota {
            memory_mb: 4_096,
            ..network_quota()
        };
        env.register_network("free-net", LicenseTier::Free, tight, false)
            .unwrap();
        let plane = &env.plane;

        let first = plane
            .admission
            .submit(join_request("worker-1", "free-net", "lic-free", NodeRole::Worker, None))
            .await
            .unwrap();
        plane.admission.decide(&first.request_id, ADMIN, true, "").await.unwrap();

        let second = plane
            .admission
            .submit(join_request("worker-2", "free-net", "lic-free", NodeRole::Worker, None))
            .await
            .unwrap();
        let err = plane
            .admission
            .decide(&second.request_id, ADMIN, true, "")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Capacity);
        // The refused request is withdrawn from the allocator queue.
        assert_eq!(plane.allocator.pending_requests(), 0);
        assert_eq!(plane.allocator.allocations_for_network("free-net").len(), 1);
    }

    // =============================================================================
    // FAIR SHARE
    // =============================================================================

    #[test]
    fn test_fair_share_splits_what_is_left() {
        let allocator = fair_share_allocator();
        let total = allocator.config().total.worker_slots;
        let ask = ResourceQuota {
            cpu_millis: 2_000,
            worker_slots: 8,
            ..ResourceQuota::ZERO
        };

        let ids: Vec<String> = ["a", "b", "c"]
            .iter()
            .map(|node| {
                let mut req = request("shared", node, LicenseTier::Enterprise, ask);
                req.allow_partial = true;
                allocator.request(req).unwrap()
            })
            .collect();
        let report = allocator.run_allocation_pass();
        assert_eq!(report.granted.len(), 3);
        assert_eq!(report.still_pending, 0);

        let granted: Vec<u64> = ids
            .iter()
            .map(|id| allocator.allocation_for_request(id).unwrap().quota.worker_slots)
            .collect();
        // First fits whole; the other two split the remaining four.
        assert_eq!(granted, vec![8, 2, 2]);
        assert_eq!(granted.iter().sum::<u64>(), total);
        assert_eq!(available(&allocator, ResourceDimension::WorkerSlots), 0);
        assert_conserved(&allocator);
    }

    #[test]
    fn test_fair_share_skips_requests_that_refuse_partial_grants() {
        let allocator = fair_share_allocator();
        let ask = ResourceQuota {
            worker_slots: 10,
            ..ResourceQuota::ZERO
        };
        allocator
            .request(request("shared", "a", LicenseTier::Enterprise, ask))
            .unwrap();
        let whole_only = allocator
            .request(request("shared", "b", LicenseTier::Enterprise, ask))
            .unwrap();

        let report = allocator.run_allocation_pass();
        assert_eq!(report.granted.len(), 1);
        assert_eq!(report.still_pending, 1);
        assert!(allocator.allocation_for_request(&whole_only).is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_fair_share_never_exceeds_pool(
            asks in prop::collection::vec((1u64..=12, 1u64..=8_000, any::<bool>()), 1..8),
        ) {
            let allocator = fair_share_allocator();
            let total = allocator.config().total;
            let mut ids = Vec::new();
            for (i, (slots, cpu, partial)) in asks.iter().enumerate() {
                let mut req = request(
                    "shared",
                    &format!("node-{i}"),
                    LicenseTier::Enterprise,
                    ResourceQuota {
                        cpu_millis: *cpu,
                        worker_slots: *slots,
                        ..ResourceQuota::ZERO
                    },
                );
                req.allow_partial = *partial;
                ids.push((allocator.request(req).unwrap(), *slots, *cpu));
            }
            allocator.run_allocation_pass();

            let mut slots_granted = 0;
            let mut cpu_granted = 0;
            for (id, slots, cpu) in &ids {
                if let Some(allocation) = allocator.allocation_for_request(id) {
                    prop_assert!(allocation.quota.worker_slots <= *slots);
                    prop_assert!(allocation.quota.cpu_millis <= *cpu);
                    slots_granted += allocation.quota.worker_slots;
                    cpu_granted += allocation.quota.cpu_millis;
                }
            }
            prop_assert!(slots_granted <= total.worker_slots);
            prop_assert!(cpu_granted <= total.cpu_millis);
            for usage in allocator.utilization().dimensions {
                prop_assert_eq!(usage.allocated + usage.available, usage.total);
            }
        }
    }
}
