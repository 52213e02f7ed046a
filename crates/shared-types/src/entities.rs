//! # Core Entities
//!
//! Identifiers and entitlement types used across every subsystem.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Identifier of a worker/client node.
pub type NodeId = String;

/// Identifier of a model-serving network.
pub type NetworkId = String;

/// Identifier of a model.
pub type ModelId = String;

/// Identifier of a network administrator.
pub type AdminId = String;

/// One second in [`Timestamp`] units.
pub const SECOND_MS: u64 = 1_000;
/// One minute in [`Timestamp`] units.
pub const MINUTE_MS: u64 = 60 * SECOND_MS;
/// One hour in [`Timestamp`] units.
pub const HOUR_MS: u64 = 60 * MINUTE_MS;
/// One day in [`Timestamp`] units.
pub const DAY_MS: u64 = 24 * HOUR_MS;

/// Ordered entitlement level. `Free < Pro < Enterprise`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LicenseTier {
    /// Community tier.
    #[serde(rename = "FREE")]
    Free,
    /// Paid professional tier.
    #[serde(rename = "PRO")]
    Pro,
    /// Enterprise tier.
    #[serde(rename = "ENT")]
    Enterprise,
}

impl LicenseTier {
    /// True if this tier satisfies a `required` tier.
    pub fn satisfies(self, required: LicenseTier) -> bool {
        self >= required
    }

    /// Short wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            LicenseTier::Free => "FREE",
            LicenseTier::Pro => "PRO",
            LicenseTier::Enterprise => "ENT",
        }
    }
}

impl fmt::Display for LicenseTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entitlement returned by the external license validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseInfo {
    /// Entitlement tier.
    pub tier: LicenseTier,
    /// License expiry.
    pub expires_at: Timestamp,
    /// Maximum clients the license may attach.
    pub max_clients: u32,
    /// Models the license may download.
    pub allowed_models: Vec<ModelId>,
    /// SHA-256 hex of the license key. The raw key is never retained.
    pub license_hash: String,
}

impl LicenseInfo {
    /// True if the license has lapsed at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// True if `model_id` is covered. An empty list allows every model.
    pub fn allows_model(&self, model_id: &str) -> bool {
        self.allowed_models.is_empty() || self.allowed_models.iter().any(|m| m == model_id)
    }
}

/// Hash a license key for storage and binding.
pub fn hash_license_key(license_key: &str) -> String {
    hex::encode(Sha256::digest(license_key.as_bytes()))
}

/// Role embedded in a node certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeRole {
    /// Serves model inference.
    Worker,
    /// Consumes inference.
    Client,
    /// Administers a network.
    Admin,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeRole::Worker => "worker",
            NodeRole::Client => "client",
            NodeRole::Admin => "admin",
        };
        f.write_str(s)
    }
}

/// Short prefix of a hash or secret for log lines.
pub fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(8).collect();
    format!("{prefix}…")
}
