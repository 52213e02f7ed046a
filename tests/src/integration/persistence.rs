//! # Restart Scenarios
//!
//! A control plane built twice over the same on-disk store picks up where
//! the first one stopped:
//!
//! | Record              | Restored by                         |
//! |---------------------|-------------------------------------|
//! | certificate authority | sealed secret, same fingerprint   |
//! | issued certificates | `AuthenticationManager::load`       |
//! | transfer keys       | `KeyManager::load`                  |
//! | join requests       | `AdmissionController::load`         |
//! | staged blocks       | read straight from the store        |

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use mm_05_admission::RequestStatus;
    use mm_06_secure_transfer::StartTransfer;
    use node_runtime::wiring::JoinFlow;
    use node_runtime::{ControlPlane, NodeConfig};
    use shared_types::{JsonFileStore, LicenseTier, MockTimeSource, NodeRole};

    use crate::fixtures::{
        join_request, model_blocks, network_quota, FixedFingerprint, TestPlane, ADMIN, T0,
    };

    const NODE: &str = "client-1";

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn open(dir: &Path) -> TestPlane {
        let store = Arc::new(JsonFileStore::open(dir).unwrap());
        let env = TestPlane::with_store(NodeConfig::for_testing(), store, T0).unwrap();
        env.register_network("net-1", LicenseTier::Pro, network_quota(), false)
            .unwrap();
        env
    }

    /// Everything the first run left behind.
    struct FirstRun {
        cert_bytes: Vec<u8>,
        request_id: String,
        key_id: String,
    }

    async fn first_run(dir: &Path) -> FirstRun {
        let env = open(dir);
        env.grant_license("lic-pro", LicenseTier::Pro).unwrap();
        let plane = env.plane.clone();

        let credentials = JoinFlow::new(plane.clone())
            .provision_identity(NODE, NodeRole::Client, "lic-pro")
            .await
            .unwrap();
        let request = plane
            .admission
            .submit(join_request(NODE, "net-1", "lic-pro", NodeRole::Client, None))
            .await
            .unwrap();

        // NODE never connects, so every block is staged.
        let session_id = plane
            .transfer
            .start_session(StartTransfer {
                admin_id: ADMIN.into(),
                client_id: NODE.into(),
                model_id: "llama-7b".into(),
                license_key: "lic-pro".into(),
                blocks: model_blocks(3, 64),
            })
            .await
            .unwrap();
        let session = plane.transfer.run(&session_id).await.unwrap();
        assert_eq!(plane.staging.staged_for(NODE).unwrap().len(), 3);

        plane.shutdown();
        FirstRun {
            cert_bytes: credentials.cert_bytes,
            request_id: request.request_id,
            key_id: session.key_id,
        }
    }

    // =============================================================================
    // RESTART
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_restart_restores_certificates_requests_keys_and_staging() {
        let dir = tempfile::tempdir().unwrap();
        let before = first_run(dir.path()).await;

        let env = open(dir.path());
        let plane = &env.plane;

        let verified = plane.auth.verify(NODE, &before.cert_bytes, None, None).unwrap();
        assert_eq!(verified.node_id, NODE);

        let request = plane.admission.get(&before.request_id).unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(plane.admission.stats().pending, 1);

        let key = plane.keys.key(&before.key_id).unwrap().unwrap();
        assert_eq!(key.metadata.encrypted_block_count, 3);
        assert!(plane.keys.validate_binding(&before.key_id));

        let staged = plane.staging.staged_for(NODE).unwrap();
        let indices: Vec<usize> = staged.iter().map(|b| b.message.block_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_refuses_to_open_on_another_machine() {
        let dir = tempfile::tempdir().unwrap();
        first_run(dir.path()).await;

        let store = Arc::new(JsonFileStore::open(dir.path()).unwrap());
        let moved = ControlPlane::build(
            NodeConfig::for_testing(),
            store,
            Arc::new(MockTimeSource::new(T0)),
            &FixedFingerprint("other-machine"),
        );
        assert!(moved.is_err());
    }
}
