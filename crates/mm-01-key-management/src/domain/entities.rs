//! Key lifecycle entities.

use serde::{Deserialize, Serialize};
use shared_types::{ModelId, Timestamp};
use std::collections::BTreeMap;

/// Symmetric algorithm a managed key is used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// AES-256 in Galois/Counter mode.
    #[default]
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
}

/// Lifecycle status of a managed key.
///
/// ```text
/// ACTIVE ──rotate──→ ROTATING ──overlap ends──→ DEPRECATED ──grace ends──→ EXPIRED
///   │                   │                           │
///   └── expires ────────┼───────────────────────────┼──────────────────→ EXPIRED
///   └───────────────────┴──────── revoke ───────────┴─────────────────→ REVOKED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyStatus {
    /// In use for new encryptions.
    Active,
    /// Superseded, still valid during the overlap window.
    Rotating,
    /// Overlap ended; material cleared.
    Deprecated,
    /// Past its lifetime.
    Expired,
    /// Explicitly revoked.
    Revoked,
}

impl KeyStatus {
    /// Whether a key in this status may decrypt.
    pub fn is_usable(self) -> bool {
        matches!(self, KeyStatus::Active | KeyStatus::Rotating)
    }

    /// Revocation is allowed from every status except these.
    pub fn is_terminal(self) -> bool {
        matches!(self, KeyStatus::Expired | KeyStatus::Revoked)
    }
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            KeyStatus::Active => "ACTIVE",
            KeyStatus::Rotating => "ROTATING",
            KeyStatus::Deprecated => "DEPRECATED",
            KeyStatus::Expired => "EXPIRED",
            KeyStatus::Revoked => "REVOKED",
        };
        f.write_str(s)
    }
}

/// What a key protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPurpose {
    /// Long-lived key for model blocks at rest.
    Storage,
    /// Session-scoped key for one transfer.
    Transfer,
}

/// Typed key metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    /// Model the key protects.
    pub model_id: ModelId,
    /// Storage or transfer.
    pub purpose: KeyPurpose,
    /// Key size.
    pub key_strength_bits: u32,
    /// Blocks encrypted under this key so far.
    pub encrypted_block_count: u64,
    /// Transfer session, for transfer keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Opaque pass-through values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl KeyMetadata {
    /// Metadata for a storage key.
    pub fn storage(model_id: impl Into<ModelId>) -> Self {
        Self {
            model_id: model_id.into(),
            purpose: KeyPurpose::Storage,
            key_strength_bits: 256,
            encrypted_block_count: 0,
            session_id: None,
            extra: BTreeMap::new(),
        }
    }

    /// Metadata for a session transfer key.
    pub fn transfer(model_id: impl Into<ModelId>, session_id: impl Into<String>) -> Self {
        Self {
            purpose: KeyPurpose::Transfer,
            session_id: Some(session_id.into()),
            ..Self::storage(model_id)
        }
    }
}

/// A hardware-bound symmetric key, without its material.
///
/// Key bytes live only in the manager's cache and in the persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedKey {
    pub key_id: String,
    pub algorithm: KeyAlgorithm,
    /// SHA-256 hex of the machine that derived the key. Never changes.
    pub hardware_fingerprint: String,
    pub license_key_hash: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub status: KeyStatus,
    pub rotation_generation: u32,
    pub predecessor_key_id: Option<String>,
    pub successor_key_id: Option<String>,
    pub metadata: KeyMetadata,
}

impl ManagedKey {
    /// Past `expires_at`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Model this key protects.
    pub fn model_id(&self) -> &str {
        &self.metadata.model_id
    }
}

/// Persisted form of a key. `key_data` is base64, empty once cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct KeyRecord {
    #[serde(flatten)]
    pub key: ManagedKey,
    pub key_data: String,
}

/// Audit entry for one rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationEvent {
    pub event_id: String,
    pub old_key_id: String,
    pub new_key_id: String,
    pub model_id: ModelId,
    pub rotated_at: Timestamp,
    pub rotated_by: String,
    /// Blocks encrypted under the old key.
    pub affected_blocks: u64,
    /// Clients asked to re-key.
    pub notified_clients: Vec<String>,
    pub generation: u32,
}

/// One revoked key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEntry {
    pub reason: String,
    pub revoked_at: Timestamp,
}

/// Persisted revocation list, stored as a single record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationList {
    pub entries: BTreeMap<String, RevocationEntry>,
}

impl RevocationList {
    /// Whether `key_id` is on the list.
    pub fn contains(&self, key_id: &str) -> bool {
        self.entries.contains_key(key_id)
    }
}

/// Parameters for a rotation.
#[derive(Debug, Clone)]
pub struct RotateKeyRequest {
    pub old_key_id: String,
    /// Must hash to the old key's license hash.
    pub license_key: String,
    /// Operator or service performing the rotation.
    pub rotated_by: String,
    /// Clients to notify, best effort.
    pub notify_targets: Vec<String>,
}

/// Outcome of one lifecycle pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// ROTATING keys moved to DEPRECATED.
    pub deprecated: usize,
    /// Keys moved to EXPIRED.
    pub expired: usize,
    /// Keys whose material was cleared.
    pub cleared: usize,
    /// Keys dropped from the cache.
    pub evicted: usize,
}

impl CleanupReport {
    /// True if the pass changed nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
