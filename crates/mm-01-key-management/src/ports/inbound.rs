//! # Inbound Port - KeyManagementApi
//!
//! Driving port used by the transfer subsystem (through an adapter in the
//! node runtime) and by operators.

use crate::domain::{CleanupReport, KeyError, ManagedKey, RotateKeyRequest};
use async_trait::async_trait;
use shared_crypto::SecretKey;

/// Key lifecycle API.
#[async_trait]
pub trait KeyManagementApi: Send + Sync {
    /// Derive a new storage key bound to this machine.
    ///
    /// # Errors
    /// - `ActiveKeyExists`: the model already has an ACTIVE storage key
    /// - `InvalidRequest`: empty license/model or zero lifetime
    async fn derive_hardware_bound_key(
        &self,
        license_key: &str,
        model_id: &str,
        lifetime_days: Option<u32>,
    ) -> Result<ManagedKey, KeyError>;

    /// Derive a session-scoped transfer key.
    async fn derive_transfer_key(
        &self,
        license_key: &str,
        model_id: &str,
        session_id: &str,
    ) -> Result<ManagedKey, KeyError>;

    /// ACTIVE storage key for the model, deriving one if needed.
    async fn get_or_derive(&self, license_key: &str, model_id: &str) -> Result<ManagedKey, KeyError>;

    /// True iff the key exists, is usable, unexpired, unrevoked and bound to this machine.
    fn validate_binding(&self, key_id: &str) -> bool;

    /// Key material, only while the binding is valid.
    fn key_material(&self, key_id: &str) -> Result<SecretKey, KeyError>;

    /// Replace a key with a linked successor.
    ///
    /// # Errors
    /// - `RotationInProgress`: another rotation holds the guard
    /// - `AlreadyRotated`: the key already has a successor
    async fn rotate(&self, request: RotateKeyRequest) -> Result<ManagedKey, KeyError>;

    /// Revoke a key.
    fn revoke(&self, key_id: &str, reason: &str) -> Result<ManagedKey, KeyError>;

    /// Run one lifecycle pass.
    fn cleanup_expired(&self) -> Result<CleanupReport, KeyError>;
}
