//! # Recovery Scenarios
//!
//! A node whose link keeps failing trips its circuit breaker. While the
//! circuit is open no recovery runs and transfers to the node fail fast.
//! Once the circuit timeout passes, the circuit closes to DISCONNECTED and a
//! recovery loop resumes, reconnecting as soon as the node is back.
//!
//! Tokio time is paused; the control-plane clock is a [`MockTimeSource`]
//! advanced by hand.
//!
//! [`MockTimeSource`]: shared_types::MockTimeSource

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mm_04_connection_recovery::{ConnectionState, RecoveryStrategy};
    use mm_06_secure_transfer::{SessionStatus, StartTransfer};
    use shared_bus::{ControlPlaneEvent, EventFilter, EventTopic};
    use shared_types::LicenseTier;

    use crate::fixtures::{model_blocks, SimulatedNode, TestPlane, ADMIN};

    const NODE: &str = "worker-1";

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Plane with `NODE` tracked but gone: its receiver was dropped.
    fn plane_with_dead_node() -> TestPlane {
        let env = TestPlane::new().unwrap();
        env.grant_license("lic-pro", LicenseTier::Pro).unwrap();
        drop(env.plane.connect_node(NODE).unwrap());
        env
    }

    fn fail(env: &TestPlane, times: u32) {
        for i in 0..times {
            env.plane
                .recovery
                .on_failure(NODE, &format!("heartbeat missed {i}"), RecoveryStrategy::Exponential)
                .unwrap();
        }
    }

    // =============================================================================
    // CIRCUIT BREAKER
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_five_failures_open_circuit_until_timeout() {
        let env = plane_with_dead_node();
        let plane = &env.plane;
        let threshold = plane.config.recovery.circuit_threshold;
        let mut events = plane
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::ConnectionRecovery]));

        fail(&env, threshold);
        assert_eq!(threshold, 5);
        assert!(plane.recovery.is_circuit_open(NODE));
        let health = plane.recovery.health(NODE).unwrap();
        assert_eq!(health.state, ConnectionState::CircuitOpen);
        assert_eq!(health.consecutive_failures, 5);

        // The loop started by the first failure sees the open circuit and stops.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!plane.recovery.is_recovering(NODE));

        // Nothing closes before the timeout.
        assert_eq!(plane.recovery.check_circuit_breakers(), 0);
        env.clock.advance(plane.config.recovery.circuit_timeout_ms - 1);
        assert_eq!(plane.recovery.check_circuit_breakers(), 0);
        assert!(plane.recovery.is_circuit_open(NODE));

        env.clock.advance(1);
        assert_eq!(plane.recovery.check_circuit_breakers(), 1);
        let health = plane.recovery.health(NODE).unwrap();
        assert_eq!(health.state, ConnectionState::Disconnected);
        assert!(!health.circuit_breaker_open);
        assert!(plane.recovery.is_recovering(NODE));

        let mut opened = 0;
        let mut closed = 0;
        for event in events.drain() {
            match event {
                ControlPlaneEvent::CircuitOpened { .. } => opened += 1,
                ControlPlaneEvent::CircuitClosed { .. } => closed += 1,
                _ => {}
            }
        }
        assert_eq!((opened, closed), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resumed_recovery_reconnects_returning_node() {
        let env = plane_with_dead_node();
        let plane = &env.plane;
        fail(&env, plane.config.recovery.circuit_threshold);
        env.clock.advance(plane.config.recovery.circuit_timeout_ms);
        assert_eq!(plane.recovery.check_circuit_breakers(), 1);

        // The node comes back on a fresh channel; the probe now succeeds.
        let node = SimulatedNode::new().spawn(plane.clone(), plane.transport.connect(NODE));
        tokio::time::sleep(Duration::from_millis(plane.config.recovery.max_delay_ms * 2)).await;

        let health = plane.recovery.health(NODE).unwrap();
        assert_eq!(health.state, ConnectionState::Connected);
        assert_eq!(health.consecutive_failures, 0);
        assert!(!plane.recovery.is_recovering(NODE));
        assert!(plane.recovery.statistics().recoveries_succeeded >= 1);
        node.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_resumed_recovery_gives_up_when_node_stays_away() {
        let env = plane_with_dead_node();
        let plane = &env.plane;
        fail(&env, plane.config.recovery.circuit_threshold);
        env.clock.advance(plane.config.recovery.circuit_timeout_ms);
        plane.recovery.check_circuit_breakers();

        // max_attempts probes at up to max_delay each.
        let budget = plane.config.recovery.max_delay_ms * u64::from(plane.config.recovery.max_attempts + 1);
        tokio::time::sleep(Duration::from_millis(budget * 2)).await;

        assert!(!plane.recovery.is_recovering(NODE));
        let health = plane.recovery.health(NODE).unwrap();
        assert_eq!(health.state, ConnectionState::Failed);
        // Reconnect attempts never trip the breaker, so the loop ran to exhaustion.
        assert_eq!(health.consecutive_failures, plane.config.recovery.max_attempts);
    }

    // =============================================================================
    // TRANSFERS AROUND AN OPEN CIRCUIT
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_transfer_to_open_circuit_fails_without_staging() {
        let env = plane_with_dead_node();
        let plane = &env.plane;
        fail(&env, plane.config.recovery.circuit_threshold);

        let session_id = plane
            .transfer
            .start_session(StartTransfer {
                admin_id: ADMIN.into(),
                client_id: NODE.into(),
                model_id: "llama-7b".into(),
                license_key: "lic-pro".into(),
                blocks: model_blocks(2, 64),
            })
            .await
            .unwrap();
        let session = plane.transfer.run(&session_id).await.unwrap();

        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.failed_blocks(), 2);
        let retries = plane.config.transfer.max_retries;
        for block in &session.blocks {
            assert_eq!(block.retry_count, retries + 1);
            assert!(block.last_error.as_deref().unwrap().contains(NODE));
        }
        // Fail-fast refusals are not link failures and are not staged.
        assert!(plane.staging.staged_for(NODE).unwrap().is_empty());
        assert_eq!(plane.recovery.health(NODE).unwrap().consecutive_failures, 5);
    }
}
