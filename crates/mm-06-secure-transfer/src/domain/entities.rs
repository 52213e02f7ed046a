//! Transfer sessions and per-block state.

use serde::{Deserialize, Serialize};
use shared_crypto::sha256_hex;
use shared_types::{AdminId, ModelId, NodeId, Timestamp};
use std::fmt;

/// State of one block within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// State of a whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Created => "CREATED",
            SessionStatus::Running => "RUNNING",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Failed => "FAILED",
            SessionStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Plaintext model block as read from storage.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelBlock {
    pub block_id: String,
    pub data: Vec<u8>,
    /// SHA-256 hex of `data` recorded when the block was stored.
    pub checksum: String,
}

impl ModelBlock {
    /// Block with a freshly computed checksum.
    pub fn new(block_id: impl Into<String>, data: Vec<u8>) -> Self {
        let checksum = sha256_hex(&data);
        Self {
            block_id: block_id.into(),
            data,
            checksum,
        }
    }

    /// Block with a checksum recorded elsewhere.
    pub fn with_checksum(block_id: impl Into<String>, data: Vec<u8>, checksum: impl Into<String>) -> Self {
        Self {
            block_id: block_id.into(),
            data,
            checksum: checksum.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl fmt::Debug for ModelBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBlock")
            .field("block_id", &self.block_id)
            .field("size", &self.data.len())
            .field("checksum", &self.checksum)
            .finish()
    }
}

/// Transfer bookkeeping for one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTransferInfo {
    pub block_id: String,
    pub index: usize,
    pub size: u64,
    /// Plaintext checksum.
    pub checksum: String,
    pub status: BlockStatus,
    /// Failed attempts so far.
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub completed_at: Option<Timestamp>,
}

/// All blocks of one model sent to one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSession {
    pub session_id: String,
    pub admin_id: AdminId,
    pub client_id: NodeId,
    pub model_id: ModelId,
    /// Transfer key protecting every block.
    pub key_id: String,
    pub status: SessionStatus,
    pub blocks: Vec<BlockTransferInfo>,
    pub total_bytes: u64,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl TransferSession {
    fn count(&self, status: BlockStatus) -> usize {
        self.blocks.iter().filter(|b| b.status == status).count()
    }

    pub fn completed_blocks(&self) -> usize {
        self.count(BlockStatus::Completed)
    }

    pub fn failed_blocks(&self) -> usize {
        self.count(BlockStatus::Failed)
    }

    pub fn cancelled_blocks(&self) -> usize {
        self.count(BlockStatus::Cancelled)
    }

    pub fn completed_bytes(&self) -> u64 {
        self.blocks
            .iter()
            .filter(|b| b.status == BlockStatus::Completed)
            .map(|b| b.size)
            .sum()
    }

    pub fn all_completed(&self) -> bool {
        self.blocks.iter().all(|b| b.status == BlockStatus::Completed)
    }

    pub fn percent_complete(&self) -> f64 {
        if self.blocks.is_empty() {
            return 100.0;
        }
        self.completed_blocks() as f64 / self.blocks.len() as f64 * 100.0
    }
}

/// Progress snapshot pushed to callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub session_id: String,
    pub total_blocks: usize,
    pub completed_blocks: usize,
    pub failed_blocks: usize,
    pub percent: f64,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    /// Observed over the current run.
    pub throughput_bytes_per_sec: Option<f64>,
    pub eta_ms: Option<u64>,
}

/// Inbound request to open a session.
#[derive(Debug, Clone)]
pub struct StartTransfer {
    pub admin_id: AdminId,
    pub client_id: NodeId,
    pub model_id: ModelId,
    /// Used once to derive the transfer key.
    pub license_key: String,
    pub blocks: Vec<ModelBlock>,
}
