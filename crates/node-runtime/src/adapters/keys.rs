use async_trait::async_trait;
use mm_01_key_management::KeyManager;
use mm_06_secure_transfer::{TransferError, TransferKey, TransferKeyProvider};
use std::sync::Arc;
use tracing::warn;

const SUBSYSTEM: &str = "node_runtime";

/// Session keys for secure transfer, minted by the key manager.
#[derive(Clone)]
pub struct ManagedTransferKeys {
    keys: Arc<KeyManager>,
}

impl ManagedTransferKeys {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl TransferKeyProvider for ManagedTransferKeys {
    async fn transfer_key(
        &self,
        license_key: &str,
        model_id: &str,
        session_id: &str,
    ) -> Result<TransferKey, TransferError> {
        let managed = self
            .keys
            .derive_transfer_key(license_key, model_id, session_id)
            .await
            .map_err(|e| TransferError::KeyUnavailable(e.reason_code().to_string()))?;
        let key = self
            .keys
            .key_material(&managed.key_id)
            .map_err(|e| TransferError::KeyUnavailable(e.reason_code().to_string()))?;
        Ok(TransferKey {
            key_id: managed.key_id,
            key,
        })
    }

    fn record_usage(&self, key_id: &str, blocks: u64) {
        if let Err(e) = self.keys.record_usage(key_id, blocks) {
            warn!(
                subsystem = SUBSYSTEM,
                key_id = %key_id,
                blocks,
                reason = e.reason_code(),
                "Block usage not recorded"
            );
        }
    }
}
