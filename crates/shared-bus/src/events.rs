//! # Control-Plane Events
//!
//! Payloads carry identifiers, reason codes and counts only. Secrets and key
//! material never enter the bus.

use serde::{Deserialize, Serialize};
use shared_types::{LicenseTier, NodeRole, Timestamp};

/// Everything a subsystem can announce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlPlaneEvent {
    // ---------------------------------------------------------------- admission
    /// A join request entered the pending queue.
    JoinRequestSubmitted {
        request_id: String,
        requester_id: String,
        network_id: String,
        tier: LicenseTier,
    },
    /// An admin approved or rejected a join request.
    JoinRequestDecided {
        request_id: String,
        network_id: String,
        admin_id: String,
        approved: bool,
    },
    /// A pending join request timed out.
    JoinRequestExpired { request_id: String, network_id: String },

    // ----------------------------------------------------------- authentication
    /// A node certificate was issued.
    CertificateIssued {
        node_id: String,
        serial: String,
        role: NodeRole,
    },
    /// A node's certificates were revoked.
    CertificateRevoked { node_id: String, certificates: usize },
    /// Certificate or challenge verification failed.
    IdentityRejected { node_id: String, reason: String },

    // ----------------------------------------------------------- key management
    /// A hardware-bound key was derived.
    KeyDerived { key_id: String, model_id: String },
    /// A key was rotated to a successor.
    KeyRotated {
        old_key_id: String,
        new_key_id: String,
        generation: u32,
    },
    /// A key was revoked.
    KeyRevoked { key_id: String, reason: String },

    // ---------------------------------------------------------- secure transfer
    /// Progress of a transfer session.
    TransferProgress { session_id: String, percent: f64 },
    /// All blocks delivered.
    TransferCompleted { session_id: String, blocks: usize },
    /// Session ended with failed or cancelled blocks.
    TransferFailed {
        session_id: String,
        failed_blocks: usize,
    },

    // ------------------------------------------------------ resource allocation
    /// A request was granted.
    ResourcesAllocated {
        allocation_id: String,
        network_id: String,
        worker_slots: u64,
        client_slots: u64,
    },
    /// An allocation returned its quota.
    ResourcesReleased {
        allocation_id: String,
        network_id: String,
        reason: String,
    },

    // ------------------------------------------------------ connection recovery
    /// A connection reported a failure.
    ConnectionLost { connection_id: String, reason: String },
    /// A connection came back.
    ConnectionRecovered { connection_id: String, attempts: u32 },
    /// Recovery gave up.
    RecoveryFailed { connection_id: String, attempts: u32 },
    /// Circuit breaker tripped.
    CircuitOpened {
        connection_id: String,
        until: Timestamp,
    },
    /// Circuit breaker cooled down.
    CircuitClosed { connection_id: String },
}

impl ControlPlaneEvent {
    /// Topic of this event.
    pub fn topic(&self) -> EventTopic {
        use ControlPlaneEvent::*;
        match self {
            JoinRequestSubmitted { .. } | JoinRequestDecided { .. } | JoinRequestExpired { .. } => {
                EventTopic::Admission
            }
            CertificateIssued { .. } | CertificateRevoked { .. } | IdentityRejected { .. } => {
                EventTopic::Authentication
            }
            KeyDerived { .. } | KeyRotated { .. } | KeyRevoked { .. } => EventTopic::KeyManagement,
            TransferProgress { .. } | TransferCompleted { .. } | TransferFailed { .. } => {
                EventTopic::SecureTransfer
            }
            ResourcesAllocated { .. } | ResourcesReleased { .. } => EventTopic::ResourceAllocation,
            ConnectionLost { .. }
            | ConnectionRecovered { .. }
            | RecoveryFailed { .. }
            | CircuitOpened { .. }
            | CircuitClosed { .. } => EventTopic::ConnectionRecovery,
        }
    }
}

/// Event topics, one per subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    /// Join workflow.
    Admission,
    /// Certificates and challenges.
    Authentication,
    /// Key lifecycle.
    KeyManagement,
    /// Block transfer.
    SecureTransfer,
    /// Quota accounting.
    ResourceAllocation,
    /// Link health.
    ConnectionRecovery,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific topics.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Accept every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Accept only the given topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &ControlPlaneEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}
