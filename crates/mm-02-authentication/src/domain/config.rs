//! Authentication configuration.

use shared_types::{DAY_MS, SECOND_MS};

/// Certificate authority and challenge settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Issuer name written into every certificate.
    pub ca_name: String,
    /// Validity of issued node certificates, ms.
    pub certificate_validity_ms: u64,
    /// Validity of the self-signed root, ms.
    pub root_validity_ms: u64,
    /// Challenge lifetime, ms.
    pub challenge_timeout_ms: u64,
    /// Failed responses allowed per challenge.
    pub max_challenge_attempts: u32,
    /// Random bytes per challenge.
    pub challenge_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            ca_name: "model-mesh-ca".to_string(),
            certificate_validity_ms: 365 * DAY_MS,
            root_validity_ms: 10 * 365 * DAY_MS,
            challenge_timeout_ms: 300 * SECOND_MS,
            max_challenge_attempts: 3,
            challenge_len: 32,
        }
    }
}

impl AuthConfig {
    /// Short windows for tests.
    pub fn for_testing() -> Self {
        Self {
            certificate_validity_ms: DAY_MS,
            challenge_timeout_ms: 10 * SECOND_MS,
            ..Self::default()
        }
    }
}
