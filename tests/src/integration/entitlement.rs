//! # Entitlement Scenarios
//!
//! A request whose license tier is below the network's requirement is
//! accepted into the queue but can never be approved. The refusal happens
//! before the reservation step, so no allocation, key or transfer session is
//! left behind.

#[cfg(test)]
mod tests {
    use mm_05_admission::{AdmissionError, RequestStatus};
    use mm_06_secure_transfer::SessionStatus;
    use node_runtime::wiring::{JoinFlow, JoinFlowError, ModelDelivery};
    use shared_bus::{EventFilter, EventTopic};
    use shared_types::{ErrorCategory, LicenseTier, NodeRole};

    use crate::fixtures::{join_request, model_blocks, network_quota, TestPlane, ADMIN};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Enterprise network, Pro license.
    fn mismatched() -> TestPlane {
        let env = TestPlane::new().unwrap();
        env.grant_license("lic-pro", LicenseTier::Pro).unwrap();
        env.register_network("ent-net", LicenseTier::Enterprise, network_quota(), false)
            .unwrap();
        env
    }

    // =============================================================================
    // TIER BELOW REQUIREMENT
    // =============================================================================

    #[tokio::test]
    async fn test_pro_request_on_enterprise_network_cannot_be_approved() {
        let env = mismatched();
        let plane = &env.plane;
        let mut allocations = plane
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::ResourceAllocation]));

        let request = plane
            .admission
            .submit(join_request("client-1", "ent-net", "lic-pro", NodeRole::Client, None))
            .await
            .unwrap();
        assert_eq!(request.license_tier, LicenseTier::Pro);

        let err = plane
            .admission
            .decide(&request.request_id, ADMIN, true, "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AdmissionError::InsufficientTier {
                required: LicenseTier::Enterprise,
                actual: LicenseTier::Pro,
            }
        ));
        assert_eq!(err.category(), ErrorCategory::Entitlement);

        assert!(plane.allocator.allocations_for_network("ent-net").is_empty());
        assert_eq!(plane.allocator.pending_requests(), 0);
        assert!(plane.keys.keys_for_model("llama-7b").is_empty());
        assert!(allocations.try_recv().unwrap().is_none());

        // Still pending: the administrator can reject it.
        let stored = plane.admission.get(&request.request_id).unwrap();
        assert_eq!(stored.status, RequestStatus::Pending);
        let decision = plane
            .admission
            .decide(&request.request_id, ADMIN, false, "upgrade your license")
            .await
            .unwrap();
        assert!(!decision.approved);
    }

    #[tokio::test]
    async fn test_join_flow_stops_before_transfer() {
        let env = mismatched();
        let plane = env.plane.clone();
        let flow = JoinFlow::new(plane.clone());

        let request = plane
            .admission
            .submit(join_request("client-1", "ent-net", "lic-pro", NodeRole::Client, None))
            .await
            .unwrap();
        let err = flow
            .approve(
                &request.request_id,
                ADMIN,
                "",
                Some(ModelDelivery {
                    model_id: "llama-7b".into(),
                    license_key: "lic-pro".into(),
                    blocks: model_blocks(2, 32),
                }),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, JoinFlowError::Admission(AdmissionError::InsufficientTier { .. })));
        assert_eq!(err.reason_code(), "admission_insufficient_tier");
        assert!(plane.transfer.session_ids().is_empty());
        assert!(plane.keys.keys_for_model("llama-7b").is_empty());
        assert!(plane.staging.staged_for("client-1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enterprise_license_is_admitted() {
        let env = mismatched();
        env.grant_license("lic-ent", LicenseTier::Enterprise).unwrap();
        let plane = env.plane.clone();

        let request = plane
            .admission
            .submit(join_request("worker-2", "ent-net", "lic-ent", NodeRole::Worker, None))
            .await
            .unwrap();
        let outcome = JoinFlow::new(plane.clone())
            .approve(
                &request.request_id,
                ADMIN,
                "",
                Some(ModelDelivery {
                    model_id: "llama-7b".into(),
                    license_key: "lic-ent".into(),
                    blocks: model_blocks(2, 32),
                }),
            )
            .await
            .unwrap();

        assert!(outcome.decision.allocation_id.is_some());
        // The node is offline, so both blocks wait in staging.
        let session = outcome.transfer.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(plane.staging.staged_for("worker-2").unwrap().len(), 2);
    }
}
