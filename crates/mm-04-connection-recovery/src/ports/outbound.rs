//! Driven ports.

use crate::domain::RecoveryError;
use async_trait::async_trait;

/// Performs one reconnect attempt for a registered connection.
#[async_trait]
pub trait ConnectionProbe: Send + Sync {
    /// Try to re-establish the link. Returns the observed response time, ms.
    async fn reconnect(&self, connection_id: &str) -> Result<u64, RecoveryError>;
}
