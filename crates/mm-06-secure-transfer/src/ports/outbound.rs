//! Driven ports.

use crate::domain::{BlockAck, BlockMessage, TransferError};
use async_trait::async_trait;
use shared_crypto::SecretKey;

/// Framed per-node channel that carries sealed blocks.
#[async_trait]
pub trait BlockTransport: Send + Sync {
    /// Whether a live channel to `client_id` exists right now.
    fn is_connected(&self, client_id: &str) -> bool;

    /// Send one block and wait for the receiver's reply.
    async fn send_block(&self, client_id: &str, message: &BlockMessage) -> Result<BlockAck, TransferError>;
}

/// Holds sealed blocks for clients without a live channel.
pub trait StagingArea: Send + Sync {
    fn stage(&self, client_id: &str, message: &BlockMessage) -> Result<(), TransferError>;
}

/// Session-scoped key material.
pub struct TransferKey {
    pub key_id: String,
    pub key: SecretKey,
}

/// Derives and accounts for transfer keys.
#[async_trait]
pub trait TransferKeyProvider: Send + Sync {
    async fn transfer_key(
        &self,
        license_key: &str,
        model_id: &str,
        session_id: &str,
    ) -> Result<TransferKey, TransferError>;

    /// Blocks sealed under `key_id` in a finished run.
    fn record_usage(&self, key_id: &str, blocks: u64);
}

/// Link health feedback.
pub trait LinkMonitor: Send + Sync {
    fn is_circuit_open(&self, client_id: &str) -> bool;

    fn report_success(&self, client_id: &str, response_time_ms: u64);

    fn report_failure(&self, client_id: &str, reason: &str);
}
