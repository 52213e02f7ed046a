//! # Staging Area over the Record Store
//!
//! Blocks for offline clients are kept as one record each in the
//! `staged_blocks` collection, keyed `<transfer_id>-<block_index>`. Backed by
//! `JsonFileStore` that is one owner-only JSON file per block.

use crate::domain::{BlockMessage, TransferError};
use crate::ports::StagingArea;
use serde::{Deserialize, Serialize};
use shared_types::storage::{load_all, save_record};
use shared_types::{KeyValueStore, NodeId, TimeSource, Timestamp};
use std::sync::Arc;
use tracing::debug;

pub const STAGED_BLOCKS_COLLECTION: &str = "staged_blocks";

/// A sealed block waiting for its client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedBlock {
    pub client_id: NodeId,
    pub staged_at: Timestamp,
    pub message: BlockMessage,
}

pub struct StoreStagingArea {
    store: Arc<dyn KeyValueStore>,
    time: Arc<dyn TimeSource>,
}

impl StoreStagingArea {
    pub fn new(store: Arc<dyn KeyValueStore>, time: Arc<dyn TimeSource>) -> Self {
        Self { store, time }
    }

    fn record_key(transfer_id: &str, block_index: usize) -> String {
        format!("{transfer_id}-{block_index:06}")
    }

    /// Staged blocks of one client, in transfer then index order.
    pub fn staged_for(&self, client_id: &str) -> Result<Vec<StagedBlock>, TransferError> {
        let all: Vec<StagedBlock> = load_all(self.store.as_ref(), STAGED_BLOCKS_COLLECTION)?;
        Ok(all.into_iter().filter(|s| s.client_id == client_id).collect())
    }

    /// Drop a staged block once delivered. Returns `true` if it was staged.
    pub fn remove(&self, transfer_id: &str, block_index: usize) -> Result<bool, TransferError> {
        let key = Self::record_key(transfer_id, block_index);
        Ok(self.store.delete(STAGED_BLOCKS_COLLECTION, &key)?)
    }
}

impl StagingArea for StoreStagingArea {
    fn stage(&self, client_id: &str, message: &BlockMessage) -> Result<(), TransferError> {
        let key = Self::record_key(&message.transfer_id, message.block_index);
        let record = StagedBlock {
            client_id: client_id.to_string(),
            staged_at: self.time.now(),
            message: message.clone(),
        };
        save_record(self.store.as_ref(), STAGED_BLOCKS_COLLECTION, &key, &record)?;
        debug!(client_id, key = %key, "block staged");
        Ok(())
    }
}
