//! # Transfer Scenarios
//!
//! Sealed blocks travel over the node channel, are decrypted by the node
//! with the session key and acknowledged with the checksum echo. Refused
//! blocks are retried with backoff; exhausted blocks can be resumed without
//! resending completed ones; a node without a channel gets its blocks staged.

#[cfg(test)]
mod tests {
    use mm_06_secure_transfer::{BlockStatus, ModelBlock, SessionStatus, StartTransfer, TransferSession};
    use shared_types::LicenseTier;

    use crate::fixtures::{model_blocks, SimulatedNode, TestPlane, ADMIN};

    const NODE: &str = "client-1";

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn env() -> TestPlane {
        let env = TestPlane::new().unwrap();
        env.grant_license("lic-pro", LicenseTier::Pro).unwrap();
        env
    }

    async fn start(env: &TestPlane, blocks: Vec<ModelBlock>) -> String {
        env.plane
            .transfer
            .start_session(StartTransfer {
                admin_id: ADMIN.into(),
                client_id: NODE.into(),
                model_id: "llama-7b".into(),
                license_key: "lic-pro".into(),
                blocks,
            })
            .await
            .unwrap()
    }

    fn assert_all_completed(session: &TransferSession) {
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.completed_blocks(), session.blocks.len());
        assert!(session.blocks.iter().all(|b| b.status == BlockStatus::Completed));
    }

    // =============================================================================
    // RETRIES
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_block_refused_twice_completes_on_third_attempt() {
        let env = env();
        let plane = &env.plane;
        let node = SimulatedNode::new()
            .reject_first(3, 2)
            .spawn(plane.clone(), plane.connect_node(NODE).unwrap());
        let blocks = model_blocks(5, 256);

        let session_id = start(&env, blocks.clone()).await;
        let session = plane.transfer.run(&session_id).await.unwrap();

        assert_all_completed(&session);
        assert_eq!(session.completed_blocks(), 5);
        assert_eq!(session.blocks[3].retry_count, 2);
        for index in [0, 1, 2, 4] {
            assert_eq!(session.blocks[index].retry_count, 0, "block {index}");
        }
        assert_eq!(node.attempts(3), 3);

        let received = node.received();
        assert_eq!(received.len(), 5);
        for (index, block) in blocks.iter().enumerate() {
            assert_eq!(received[&index], block.data);
        }

        let key = plane.keys.key(&session.key_id).unwrap().unwrap();
        assert_eq!(key.metadata.encrypted_block_count, 5);
        // Refusals come with an acknowledgement, so the link stays healthy.
        assert_eq!(plane.recovery.health(NODE).unwrap().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_block_resumes_without_resending_others() {
        let env = env();
        let plane = &env.plane;
        let attempts = plane.config.transfer.max_retries + 1;
        let node = SimulatedNode::new()
            .reject_first(1, attempts)
            .spawn(plane.clone(), plane.connect_node(NODE).unwrap());

        let session_id = start(&env, model_blocks(3, 128)).await;
        let session = plane.transfer.run(&session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.failed_blocks(), 1);
        assert_eq!(session.blocks[1].status, BlockStatus::Failed);
        assert_eq!(session.blocks[1].retry_count, attempts);
        assert!(session.blocks[1].last_error.is_some());

        let resumed = plane.transfer.resume(&session_id).await.unwrap();
        assert_all_completed(&resumed);
        assert_eq!(node.attempts(0), 1);
        assert_eq!(node.attempts(2), 1);
        assert_eq!(node.attempts(1), attempts + 1);
        assert_eq!(node.received().len(), 3);
    }

    // =============================================================================
    // OFFLINE NODES
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_offline_node_receives_staged_blocks_on_connect() {
        let env = env();
        let plane = &env.plane;
        let blocks = model_blocks(4, 64);

        let session_id = start(&env, blocks.clone()).await;
        let session = plane.transfer.run(&session_id).await.unwrap();
        assert_all_completed(&session);
        assert_eq!(plane.staging.staged_for(NODE).unwrap().len(), 4);

        let node = SimulatedNode::new().spawn(plane.clone(), plane.connect_node(NODE).unwrap());
        assert_eq!(plane.deliver_staged(NODE).await.unwrap(), 4);
        assert!(plane.staging.staged_for(NODE).unwrap().is_empty());

        let received = node.received();
        for (index, block) in blocks.iter().enumerate() {
            assert_eq!(received[&index], block.data);
        }
        // A second delivery finds nothing left.
        assert_eq!(plane.deliver_staged(NODE).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_staged_block_refused_stays_staged() {
        let env = env();
        let plane = &env.plane;
        let session_id = start(&env, model_blocks(2, 64)).await;
        plane.transfer.run(&session_id).await.unwrap();

        let node = SimulatedNode::new()
            .reject_first(0, 1)
            .spawn(plane.clone(), plane.connect_node(NODE).unwrap());
        assert_eq!(plane.deliver_staged(NODE).await.unwrap(), 1);
        let left = plane.staging.staged_for(NODE).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].message.block_index, 0);

        assert_eq!(plane.deliver_staged(NODE).await.unwrap(), 1);
        assert_eq!(node.received().len(), 2);
    }
}
