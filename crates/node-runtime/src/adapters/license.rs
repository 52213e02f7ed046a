use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::storage::{load_record, save_record};
use shared_types::{
    hash_license_key, redact, KeyValueStore, LicenseError, LicenseInfo, LicenseTier,
    LicenseValidator, ModelId, StorageError, TimeSource, Timestamp,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const SUBSYSTEM: &str = "node_runtime";

/// Collection of license entitlements, keyed by license hash.
pub const LICENSES_COLLECTION: &str = "licenses";

/// One entry of a license import file. The raw key is hashed on import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseGrant {
    pub license_key: String,
    pub tier: LicenseTier,
    pub expires_at: Timestamp,
    #[serde(default = "default_max_clients")]
    pub max_clients: u32,
    #[serde(default)]
    pub allowed_models: Vec<ModelId>,
}

fn default_max_clients() -> u32 {
    1
}

#[derive(Debug, Error)]
pub enum LicenseImportError {
    #[error("cannot read license file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed license file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// License validator backed by the node's record store.
///
/// Stands in for the external license service on self-hosted nodes. Only
/// license hashes are persisted.
pub struct StoreLicenseTable {
    store: Arc<dyn KeyValueStore>,
    time: Arc<dyn TimeSource>,
}

impl StoreLicenseTable {
    pub fn new(store: Arc<dyn KeyValueStore>, time: Arc<dyn TimeSource>) -> Self {
        Self { store, time }
    }

    /// Record an entitlement, replacing any earlier grant of the same key.
    pub fn grant(&self, grant: LicenseGrant) -> Result<LicenseInfo, StorageError> {
        let info = LicenseInfo {
            tier: grant.tier,
            expires_at: grant.expires_at,
            max_clients: grant.max_clients,
            allowed_models: grant.allowed_models,
            license_hash: hash_license_key(&grant.license_key),
        };
        save_record(self.store.as_ref(), LICENSES_COLLECTION, &info.license_hash, &info)?;
        debug!(
            subsystem = SUBSYSTEM,
            license = %redact(&info.license_hash),
            tier = %info.tier,
            "License granted"
        );
        Ok(info)
    }

    /// Withdraw a license. Returns `true` if it was known.
    pub fn revoke(&self, license_key: &str) -> Result<bool, StorageError> {
        self.store
            .delete(LICENSES_COLLECTION, &hash_license_key(license_key))
    }

    /// Import a JSON array of [`LicenseGrant`]s.
    pub fn import_file(&self, path: &Path) -> Result<usize, LicenseImportError> {
        let raw = std::fs::read_to_string(path)?;
        let grants: Vec<LicenseGrant> = serde_json::from_str(&raw)?;
        let imported = grants.len();
        for grant in grants {
            self.grant(grant)?;
        }
        info!(subsystem = SUBSYSTEM, path = %path.display(), imported, "License file imported");
        Ok(imported)
    }
}

#[async_trait]
impl LicenseValidator for StoreLicenseTable {
    async fn validate(&self, license_key: &str) -> Result<LicenseInfo, LicenseError> {
        let hash = hash_license_key(license_key);
        let info: LicenseInfo = load_record(self.store.as_ref(), LICENSES_COLLECTION, &hash)
            .map_err(|e| LicenseError::Unavailable(e.reason_code().to_string()))?
            .ok_or(LicenseError::Invalid)?;
        if info.is_expired(self.time.now()) {
            return Err(LicenseError::Expired {
                expired_at: info.expires_at,
            });
        }
        Ok(info)
    }
}
