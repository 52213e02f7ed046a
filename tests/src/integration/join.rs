//! # End-to-End Join
//!
//! ```text
//! provision_identity ──► submit (certificate attached) ──► approve
//!        │                        │                           │
//!   auth issues cert      auth verifies cert          allocator reserves,
//!   bound to license      identity_verified = true    keys derive, transfer
//!                                                      seals, node decrypts
//! ```

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mm_05_admission::{AdmissionError, RequestStatus};
    use mm_06_secure_transfer::SessionStatus;
    use node_runtime::handlers::MetricsRecorder;
    use node_runtime::wiring::{JoinFlow, ModelDelivery, PeriodicTasks};
    use shared_bus::{ControlPlaneEvent, EventFilter};
    use shared_types::{hash_license_key, ErrorCategory, LicenseTier, NodeRole, HOUR_MS};
    use tokio::sync::watch;

    use crate::fixtures::{join_request, model_blocks, network_quota, SimulatedNode, TestPlane, ADMIN};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Pro network that demands a verified identity.
    fn env() -> TestPlane {
        let env = TestPlane::new().unwrap();
        env.grant_license("lic-pro", LicenseTier::Pro).unwrap();
        env.register_network("net-1", LicenseTier::Pro, network_quota(), true)
            .unwrap();
        env
    }

    fn delivery(blocks: usize) -> ModelDelivery {
        ModelDelivery {
            model_id: "llama-7b".into(),
            license_key: "lic-pro".into(),
            blocks: model_blocks(blocks, 512),
        }
    }

    fn index_of(events: &[ControlPlaneEvent], pred: impl Fn(&ControlPlaneEvent) -> bool) -> usize {
        events
            .iter()
            .position(pred)
            .unwrap_or_else(|| panic!("event missing from {events:?}"))
    }

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test]
    async fn test_provisioned_node_joins_and_decrypts_model() {
        let env = env();
        let plane = env.plane.clone();
        let flow = JoinFlow::new(plane.clone());
        let mut events = plane.bus.subscribe(EventFilter::all());

        let credentials = flow
            .provision_identity("client-1", NodeRole::Client, "lic-pro")
            .await
            .unwrap();
        let verified = plane
            .auth
            .verify("client-1", &credentials.cert_bytes, None, None)
            .unwrap();
        assert_eq!(verified.license_hash, Some(hash_license_key("lic-pro")));

        let request = plane
            .admission
            .submit(join_request(
                "client-1",
                "net-1",
                "lic-pro",
                NodeRole::Client,
                Some(credentials.cert_bytes.clone()),
            ))
            .await
            .unwrap();
        assert!(request.identity_verified);

        let node = SimulatedNode::new().spawn(plane.clone(), plane.connect_node("client-1").unwrap());
        let model = delivery(4);
        let expected: Vec<Vec<u8>> = model.blocks.iter().map(|b| b.data.clone()).collect();

        let outcome = flow
            .approve(&request.request_id, ADMIN, "welcome", Some(model))
            .await
            .unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.request.status, RequestStatus::Approved);

        let allocation_id = outcome.decision.allocation_id.clone().unwrap();
        let allocation = plane.allocator.allocation(&allocation_id).unwrap();
        assert_eq!(allocation.requester_id, "client-1");

        let session = outcome.transfer.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        let received: Vec<Vec<u8>> = node.received().into_values().collect();
        assert_eq!(received, expected);

        let seen = events.drain();
        let issued = index_of(&seen, |e| matches!(e, ControlPlaneEvent::CertificateIssued { .. }));
        let submitted = index_of(&seen, |e| matches!(e, ControlPlaneEvent::JoinRequestSubmitted { .. }));
        let allocated = index_of(&seen, |e| matches!(e, ControlPlaneEvent::ResourcesAllocated { .. }));
        let decided = index_of(&seen, |e| {
            matches!(e, ControlPlaneEvent::JoinRequestDecided { approved: true, .. })
        });
        let completed = index_of(&seen, |e| matches!(e, ControlPlaneEvent::TransferCompleted { .. }));
        assert!(issued < submitted);
        assert!(submitted < allocated);
        assert!(allocated < decided);
        assert!(decided < completed);
    }

    // =============================================================================
    // IDENTITY
    // =============================================================================

    #[tokio::test]
    async fn test_certificate_for_another_node_is_rejected() {
        let env = env();
        let plane = env.plane.clone();
        let stolen = JoinFlow::new(plane.clone())
            .provision_identity("client-1", NodeRole::Client, "lic-pro")
            .await
            .unwrap();

        let err = plane
            .admission
            .submit(join_request(
                "client-2",
                "net-1",
                "lic-pro",
                NodeRole::Client,
                Some(stolen.cert_bytes),
            ))
            .await
            .unwrap_err();
        assert!(matches!(&err, AdmissionError::IdentityRejected(reason) if reason == "auth_node_mismatch"));
        assert_eq!(err.category(), ErrorCategory::Identity);
        assert_eq!(plane.admission.stats().pending, 0);
    }

    #[tokio::test]
    async fn test_revoked_certificate_is_rejected() {
        let env = env();
        let plane = env.plane.clone();
        let credentials = JoinFlow::new(plane.clone())
            .provision_identity("client-1", NodeRole::Client, "lic-pro")
            .await
            .unwrap();
        assert_eq!(plane.auth.revoke("client-1").unwrap(), 1);

        let err = plane
            .admission
            .submit(join_request(
                "client-1",
                "net-1",
                "lic-pro",
                NodeRole::Client,
                Some(credentials.cert_bytes),
            ))
            .await
            .unwrap_err();
        assert!(matches!(&err, AdmissionError::IdentityRejected(reason) if reason == "auth_revoked"));
    }

    #[tokio::test]
    async fn test_unverified_request_cannot_be_approved() {
        let env = env();
        let plane = env.plane.clone();
        let request = plane
            .admission
            .submit(join_request("client-1", "net-1", "lic-pro", NodeRole::Client, None))
            .await
            .unwrap();
        assert!(!request.identity_verified);

        let err = JoinFlow::new(plane.clone())
            .approve(&request.request_id, ADMIN, "", Some(delivery(1)))
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "admission_identity_required");
        assert!(plane.transfer.session_ids().is_empty());
    }

    // =============================================================================
    // BACKGROUND TASKS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_background_tasks_expire_unanswered_request_and_record_metrics() {
        let env = env();
        let plane = env.plane.clone();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let recorder = tokio::spawn(MetricsRecorder::new(&plane.bus).run(shutdown_rx.clone()));
        let tasks = PeriodicTasks::start(&plane, shutdown_rx);

        let request = plane
            .admission
            .submit(join_request("client-1", "net-1", "lic-pro", NodeRole::Client, None))
            .await
            .unwrap();

        env.clock.advance(2 * HOUR_MS);
        tokio::time::sleep(Duration::from_millis(plane.config.schedule.admission_sweep_ms * 2)).await;
        assert_eq!(
            plane.admission.get(&request.request_id).unwrap().status,
            RequestStatus::Expired
        );

        shutdown_tx.send(true).unwrap();
        tasks.join().await;
        // Submitted and expired.
        assert!(recorder.await.unwrap() >= 2);
    }
}
