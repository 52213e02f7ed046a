//! Driving port.

use crate::domain::{StartTransfer, TransferError, TransferProgress, TransferSession};
use async_trait::async_trait;

/// Session control for the admin side of a model transfer.
#[async_trait]
pub trait SecureTransferApi: Send + Sync {
    /// Open a session and derive its key. Returns the session id.
    async fn start_session(&self, request: StartTransfer) -> Result<String, TransferError>;

    /// Send every pending block. Returns the final session snapshot.
    async fn run(&self, session_id: &str) -> Result<TransferSession, TransferError>;

    /// Re-queue failed and cancelled blocks and run again.
    async fn resume(&self, session_id: &str) -> Result<TransferSession, TransferError>;

    /// Stop scheduling blocks of a session.
    fn cancel(&self, session_id: &str) -> Result<(), TransferError>;

    fn progress(&self, session_id: &str) -> Result<TransferProgress, TransferError>;
}
