//! Driving port.

use crate::domain::{ConnectionHealth, RecoveryError, RecoveryStrategy};

/// Failure and success reports from whoever owns the link.
pub trait ConnectionRecoveryApi: Send + Sync {
    /// A send or heartbeat failed.
    fn on_failure(
        &self,
        connection_id: &str,
        reason: &str,
        strategy: RecoveryStrategy,
    ) -> Result<(), RecoveryError>;

    /// A send or heartbeat succeeded in `response_time_ms`.
    fn on_healthy(&self, connection_id: &str, response_time_ms: u64) -> Result<(), RecoveryError>;

    /// Whether the breaker is open.
    fn is_circuit_open(&self, connection_id: &str) -> bool;

    /// Health snapshot.
    fn health(&self, connection_id: &str) -> Option<ConnectionHealth>;
}
