use mesh_telemetry::log_event;
use mm_04_connection_recovery::{ConnectionRecovery, RecoveryStrategy};
use mm_06_secure_transfer::LinkMonitor;

const SUBSYSTEM: &str = "node_runtime";

/// Transfer link feedback routed into connection recovery.
///
/// Links the recovery engine does not track are treated as healthy and their
/// reports are dropped.
#[derive(Clone)]
pub struct RecoveryLinkMonitor {
    recovery: ConnectionRecovery,
    strategy: RecoveryStrategy,
}

impl RecoveryLinkMonitor {
    pub fn new(recovery: ConnectionRecovery) -> Self {
        Self {
            recovery,
            strategy: RecoveryStrategy::Exponential,
        }
    }

    pub fn with_strategy(mut self, strategy: RecoveryStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

impl LinkMonitor for RecoveryLinkMonitor {
    fn is_circuit_open(&self, client_id: &str) -> bool {
        self.recovery.is_circuit_open(client_id)
    }

    fn report_success(&self, client_id: &str, response_time_ms: u64) {
        if let Err(e) = self.recovery.on_healthy(client_id, response_time_ms) {
            log_event!(debug, SUBSYSTEM, "Untracked link success", client_id, reason = e.reason_code());
        }
    }

    fn report_failure(&self, client_id: &str, reason: &str) {
        if let Err(e) = self.recovery.on_failure(client_id, reason, self.strategy) {
            log_event!(debug, SUBSYSTEM, "Untracked link failure", client_id, reason = e.reason_code());
        }
    }
}
