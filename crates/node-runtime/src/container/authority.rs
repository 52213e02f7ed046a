//! # Persistent Certificate Authority
//!
//! The authority's signing secret is sealed under a key derived from the
//! machine fingerprint and kept in the record store, so certificates issued
//! before a restart still verify afterwards. Moving the store to another
//! machine makes the secret unreadable.

use mm_02_authentication::{AuthConfig, CertificateAuthority};
use serde::{Deserialize, Serialize};
use shared_crypto::{hkdf_expand, open, seal, sha256, SecretKey};
use shared_types::storage::{load_record, save_record};
use shared_types::{KeyValueStore, Timestamp};
use tracing::info;

use super::errors::ControlPlaneError;

pub const AUTHORITY_COLLECTION: &str = "authority";
const AUTHORITY_KEY: &str = "root";
const WRAP_SALT: &[u8] = b"model-mesh-authority";
const WRAP_INFO: &[u8] = b"ca-secret-wrap-v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuthorityRecord {
    name: String,
    /// Hex of nonce ‖ ciphertext ‖ tag.
    sealed_secret: String,
    created_at: Timestamp,
}

fn wrap_key(fingerprint: &str) -> Result<SecretKey, ControlPlaneError> {
    let ikm = SecretKey::from_bytes(sha256(fingerprint.as_bytes()));
    Ok(hkdf_expand(&ikm, Some(WRAP_SALT), WRAP_INFO)?)
}

/// Load the stored authority, or create and store a fresh one.
pub fn load_or_create_authority(
    store: &dyn KeyValueStore,
    fingerprint: &str,
    config: &AuthConfig,
    now: Timestamp,
) -> Result<CertificateAuthority, ControlPlaneError> {
    let wrap = wrap_key(fingerprint)?;

    if let Some(record) = load_record::<AuthorityRecord>(store, AUTHORITY_COLLECTION, AUTHORITY_KEY)? {
        let sealed = hex::decode(&record.sealed_secret)
            .map_err(|e| ControlPlaneError::Authority(format!("stored secret is not hex: {e}")))?;
        let secret = SecretKey::from_slice(&open(&wrap, &sealed)?)?;
        let ca = CertificateAuthority::from_secret(
            &record.name,
            secret.as_bytes(),
            now,
            config.root_validity_ms,
        )?;
        info!(subsystem = "node_runtime", ca = %record.name, "Certificate authority restored");
        return Ok(ca);
    }

    let secret = SecretKey::generate();
    let ca = CertificateAuthority::from_secret(&config.ca_name, secret.as_bytes(), now, config.root_validity_ms)?;
    let record = AuthorityRecord {
        name: config.ca_name.clone(),
        sealed_secret: hex::encode(seal(&wrap, secret.as_bytes())?),
        created_at: now,
    };
    save_record(store, AUTHORITY_COLLECTION, AUTHORITY_KEY, &record)?;
    info!(subsystem = "node_runtime", ca = %config.ca_name, "Certificate authority created");
    Ok(ca)
}
