//! Key manager configuration.

use shared_types::DAY_MS;

/// Tunables for derivation and the key lifecycle.
#[derive(Debug, Clone)]
pub struct KeyManagerConfig {
    /// PBKDF2-HMAC-SHA256 iterations.
    pub pbkdf2_iterations: u32,
    /// Default storage key lifetime in days.
    pub default_lifetime_days: u32,
    /// Lifetime of session transfer keys, ms.
    pub transfer_key_lifetime_ms: u64,
    /// How long a rotated key stays usable, ms.
    pub rotation_overlap_ms: u64,
    /// How long a DEPRECATED key is kept before EXPIRED, ms.
    pub deprecated_grace_ms: u64,
    /// Rotation events retained.
    pub max_rotation_log: usize,
}

impl Default for KeyManagerConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 210_000,
            default_lifetime_days: 365,
            transfer_key_lifetime_ms: DAY_MS,
            rotation_overlap_ms: 7 * DAY_MS,
            deprecated_grace_ms: DAY_MS,
            max_rotation_log: 1000,
        }
    }
}

impl KeyManagerConfig {
    /// Cheap derivation for tests.
    pub fn for_testing() -> Self {
        Self {
            pbkdf2_iterations: shared_crypto::kdf::MIN_PBKDF2_ITERATIONS,
            max_rotation_log: 5,
            ..Self::default()
        }
    }
}
