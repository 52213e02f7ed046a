//! Block wire format.
//!
//! A sealed block travels as JSON:
//!
//! ```text
//! { transfer_id, block_id, block_index, total_size,
//!   checksum: sha256 hex of the sealed bytes,
//!   data:     base64(nonce ‖ ciphertext ‖ tag) }
//! ```
//!
//! The receiver checks `checksum` before it attempts decryption, so a
//! corrupted payload is rejected without touching the key.

use super::entities::ModelBlock;
use super::errors::TransferError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use shared_crypto::{open, seal, sha256_hex, verify_sha256_hex, SecretKey};

/// One encrypted block on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMessage {
    pub transfer_id: String,
    pub block_id: String,
    pub block_index: usize,
    /// Plaintext size in bytes.
    pub total_size: u64,
    pub checksum: String,
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Success,
    Error,
}

/// Receiver reply to a [`BlockMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAck {
    pub status: AckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Echo of the message checksum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl BlockAck {
    pub fn success(checksum: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Success,
            error: None,
            checksum: Some(checksum.into()),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Error,
            error: Some(reason.into()),
            checksum: None,
        }
    }
}

/// Verify the stored checksum of `block` and seal it under `key`.
pub fn seal_block(
    key: &SecretKey,
    transfer_id: &str,
    block_index: usize,
    block: &ModelBlock,
) -> Result<BlockMessage, TransferError> {
    if !verify_sha256_hex(&block.data, &block.checksum) {
        return Err(TransferError::CorruptBlock {
            block_id: block.block_id.clone(),
        });
    }

    let sealed = seal(key, &block.data)?;
    Ok(BlockMessage {
        transfer_id: transfer_id.to_string(),
        block_id: block.block_id.clone(),
        block_index,
        total_size: block.size(),
        checksum: sha256_hex(&sealed),
        data: BASE64.encode(&sealed),
    })
}

/// Receiver side: check integrity, then decrypt.
pub fn open_block(key: &SecretKey, message: &BlockMessage) -> Result<Vec<u8>, TransferError> {
    let sealed = BASE64
        .decode(message.data.as_bytes())
        .map_err(|e| TransferError::Encoding(e.to_string()))?;

    if !verify_sha256_hex(&sealed, &message.checksum) {
        return Err(TransferError::ChecksumMismatch {
            block_id: message.block_id.clone(),
        });
    }

    Ok(open(key, &sealed)?)
}
