//! Transfer errors.

use super::entities::SessionStatus;
use shared_crypto::CryptoError;
use shared_types::{ErrorCategory, StorageError};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("transfer session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("session {session_id} is {status}")]
    InvalidSessionState {
        session_id: String,
        status: SessionStatus,
    },

    /// Stored plaintext no longer matches its recorded checksum.
    #[error("block {block_id} failed its stored integrity check")]
    CorruptBlock { block_id: String },

    #[error("checksum mismatch on block {block_id}")]
    ChecksumMismatch { block_id: String },

    #[error("receiver echoed a different checksum for block {block_id}")]
    AckChecksumMismatch { block_id: String },

    #[error("transport failed: {0}")]
    TransportFailed(String),

    #[error("no acknowledgement within {timeout_ms}ms")]
    AckTimeout { timeout_ms: u64 },

    #[error("receiver rejected block: {reason}")]
    Rejected { reason: String },

    #[error("link to {client_id} is circuit-broken")]
    CircuitOpen { client_id: String },

    #[error("transfer key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("no route to {client_id}")]
    NoRoute { client_id: String },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TransferError {
    /// Taxonomy class.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TransferError::SessionNotFound(_)
            | TransferError::InvalidRequest(_)
            | TransferError::InvalidSessionState { .. }
            | TransferError::Encoding(_) => ErrorCategory::Validation,
            TransferError::ChecksumMismatch { .. } | TransferError::AckChecksumMismatch { .. } => {
                ErrorCategory::Integrity
            }
            TransferError::TransportFailed(_)
            | TransferError::AckTimeout { .. }
            | TransferError::Rejected { .. }
            | TransferError::CircuitOpen { .. }
            | TransferError::NoRoute { .. } => ErrorCategory::Transient,
            TransferError::CorruptBlock { .. } | TransferError::KeyUnavailable(_) => {
                ErrorCategory::Fatal
            }
            TransferError::Crypto(e) if e.is_tampering() => ErrorCategory::Integrity,
            TransferError::Crypto(_) => ErrorCategory::Fatal,
            TransferError::Storage(e) => e.category(),
        }
    }

    /// Whether another attempt of the same block may succeed.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Stable reason code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            TransferError::SessionNotFound(_) => "transfer_session_not_found",
            TransferError::InvalidRequest(_) => "transfer_invalid_request",
            TransferError::InvalidSessionState { .. } => "transfer_invalid_session_state",
            TransferError::CorruptBlock { .. } => "transfer_corrupt_block",
            TransferError::ChecksumMismatch { .. } => "transfer_checksum_mismatch",
            TransferError::AckChecksumMismatch { .. } => "transfer_ack_checksum_mismatch",
            TransferError::TransportFailed(_) => "transfer_transport_failed",
            TransferError::AckTimeout { .. } => "transfer_ack_timeout",
            TransferError::Rejected { .. } => "transfer_rejected",
            TransferError::CircuitOpen { .. } => "transfer_circuit_open",
            TransferError::KeyUnavailable(_) => "transfer_key_unavailable",
            TransferError::NoRoute { .. } => "transfer_no_route",
            TransferError::Encoding(_) => "transfer_encoding",
            TransferError::Crypto(_) => "transfer_crypto",
            TransferError::Storage(e) => e.reason_code(),
        }
    }
}
