//! # Metrics Recorder
//!
//! Turns bus events into Prometheus counters. Gauges that describe current
//! state (pending requests, open circuits, pool utilization) are set by the
//! periodic passes instead, from the subsystems' own snapshots.

use mesh_telemetry::{
    metric_inc, ALLOCATIONS, CERTIFICATES_ISSUED, CONNECTION_EVENTS, EVENT_BUS_MESSAGES,
    IDENTITY_REJECTIONS, JOIN_REQUESTS, KEY_OPERATIONS, TRANSFER_PROGRESS, TRANSFER_SESSIONS,
};
use shared_bus::{ControlPlaneEvent, EventFilter, EventTopic, InMemoryEventBus, Subscription};
use tokio::sync::watch;
use tracing::info;

const SUBSYSTEM: &str = "node_runtime";

fn topic_label(topic: EventTopic) -> &'static str {
    match topic {
        EventTopic::Admission => "admission",
        EventTopic::Authentication => "authentication",
        EventTopic::KeyManagement => "key_management",
        EventTopic::SecureTransfer => "secure_transfer",
        EventTopic::ResourceAllocation => "resource_allocation",
        EventTopic::ConnectionRecovery => "connection_recovery",
        EventTopic::All => "all",
    }
}

/// Update the counters for one event.
pub fn record(event: &ControlPlaneEvent) {
    metric_inc!(EVENT_BUS_MESSAGES, &[topic_label(event.topic())]);

    match event {
        ControlPlaneEvent::JoinRequestSubmitted { .. } => metric_inc!(JOIN_REQUESTS, &["submitted"]),
        ControlPlaneEvent::JoinRequestDecided { approved: true, .. } => {
            metric_inc!(JOIN_REQUESTS, &["approved"])
        }
        ControlPlaneEvent::JoinRequestDecided { approved: false, .. } => {
            metric_inc!(JOIN_REQUESTS, &["rejected"])
        }
        ControlPlaneEvent::JoinRequestExpired { .. } => metric_inc!(JOIN_REQUESTS, &["expired"]),

        ControlPlaneEvent::CertificateIssued { role, .. } => {
            metric_inc!(CERTIFICATES_ISSUED, &[role.to_string().as_str()])
        }
        ControlPlaneEvent::CertificateRevoked { .. } => {}
        ControlPlaneEvent::IdentityRejected { reason, .. } => {
            metric_inc!(IDENTITY_REJECTIONS, &[reason.as_str()])
        }

        ControlPlaneEvent::KeyDerived { .. } => metric_inc!(KEY_OPERATIONS, &["derived"]),
        ControlPlaneEvent::KeyRotated { .. } => metric_inc!(KEY_OPERATIONS, &["rotated"]),
        ControlPlaneEvent::KeyRevoked { .. } => metric_inc!(KEY_OPERATIONS, &["revoked"]),

        ControlPlaneEvent::TransferProgress { percent, .. } => TRANSFER_PROGRESS.set(*percent),
        ControlPlaneEvent::TransferCompleted { .. } => metric_inc!(TRANSFER_SESSIONS, &["completed"]),
        ControlPlaneEvent::TransferFailed { .. } => metric_inc!(TRANSFER_SESSIONS, &["failed"]),

        ControlPlaneEvent::ResourcesAllocated { .. } => metric_inc!(ALLOCATIONS, &["granted"]),
        ControlPlaneEvent::ResourcesReleased { .. } => metric_inc!(ALLOCATIONS, &["released"]),

        ControlPlaneEvent::ConnectionLost { .. } => metric_inc!(CONNECTION_EVENTS, &["lost"]),
        ControlPlaneEvent::ConnectionRecovered { .. } => metric_inc!(CONNECTION_EVENTS, &["recovered"]),
        ControlPlaneEvent::RecoveryFailed { .. } => metric_inc!(CONNECTION_EVENTS, &["failed"]),
        ControlPlaneEvent::CircuitOpened { .. } => metric_inc!(CONNECTION_EVENTS, &["circuit_opened"]),
        ControlPlaneEvent::CircuitClosed { .. } => metric_inc!(CONNECTION_EVENTS, &["circuit_closed"]),
    }
}

/// Bus subscriber that records every event.
pub struct MetricsRecorder {
    subscription: Subscription,
}

impl MetricsRecorder {
    /// Subscribe now, so no event published after this call is missed.
    pub fn new(bus: &InMemoryEventBus) -> Self {
        Self {
            subscription: bus.subscribe(EventFilter::all()),
        }
    }

    /// Record events until shutdown or until the bus is dropped.
    /// Returns how many events were recorded.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!(subsystem = SUBSYSTEM, "Metrics recorder started");
        let mut recorded = 0u64;
        loop {
            tokio::select! {
                event = self.subscription.recv() => match event {
                    Some(event) => {
                        record(&event);
                        recorded += 1;
                    }
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        // Events already queued at shutdown still count.
        while let Ok(Some(event)) = self.subscription.try_recv() {
            record(&event);
            recorded += 1;
        }
        info!(subsystem = SUBSYSTEM, recorded, "Metrics recorder stopped");
        recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::EventPublisher;
    use shared_types::NodeRole;

    // ===== TEST GROUP 1: Event mapping =====

    #[test]
    fn test_decisions_counted_by_outcome() {
        let approved = JOIN_REQUESTS.with_label_values(&["approved"]).get();
        let rejected = JOIN_REQUESTS.with_label_values(&["rejected"]).get();

        record(&ControlPlaneEvent::JoinRequestDecided {
            request_id: "r-1".into(),
            network_id: "net-1".into(),
            admin_id: "admin-1".into(),
            approved: true,
        });
        record(&ControlPlaneEvent::JoinRequestDecided {
            request_id: "r-2".into(),
            network_id: "net-1".into(),
            admin_id: "admin-1".into(),
            approved: false,
        });

        assert!(JOIN_REQUESTS.with_label_values(&["approved"]).get() >= approved + 1.0);
        assert!(JOIN_REQUESTS.with_label_values(&["rejected"]).get() >= rejected + 1.0);
    }

    #[test]
    fn test_certificate_role_label() {
        let role = NodeRole::Worker.to_string();
        let before = CERTIFICATES_ISSUED.with_label_values(&[role.as_str()]).get();
        record(&ControlPlaneEvent::CertificateIssued {
            node_id: "worker-1".into(),
            serial: "s-1".into(),
            role: NodeRole::Worker,
        });
        assert!(CERTIFICATES_ISSUED.with_label_values(&[role.as_str()]).get() >= before + 1.0);
    }

    #[test]
    fn test_topic_counter() {
        let before = EVENT_BUS_MESSAGES.with_label_values(&["connection_recovery"]).get();
        record(&ControlPlaneEvent::CircuitClosed {
            connection_id: "client-1".into(),
        });
        assert!(EVENT_BUS_MESSAGES.with_label_values(&["connection_recovery"]).get() >= before + 1.0);
    }

    // ===== TEST GROUP 2: Subscription loop =====

    #[tokio::test]
    async fn test_run_records_until_shutdown() {
        let bus = InMemoryEventBus::new();
        let recorder = MetricsRecorder::new(&bus);
        let (tx, rx) = watch::channel(false);

        bus.publish(ControlPlaneEvent::KeyDerived {
            key_id: "k-1".into(),
            model_id: "llama-7b".into(),
        });
        bus.publish(ControlPlaneEvent::TransferCompleted {
            session_id: "s-1".into(),
            blocks: 4,
        });

        let handle = tokio::spawn(recorder.run(rx));
        tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_run_ends_when_bus_dropped() {
        let bus = InMemoryEventBus::new();
        let recorder = MetricsRecorder::new(&bus);
        let (_tx, rx) = watch::channel(false);
        drop(bus);
        assert_eq!(recorder.run(rx).await, 0);
    }
}
