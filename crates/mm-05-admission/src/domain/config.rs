//! Admission configuration.

use shared_types::{DAY_MS, HOUR_MS, MINUTE_MS, SECOND_MS};

#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Pending requests held at once.
    pub max_pending: usize,
    /// Lifetime of a pending request unless the submission overrides it, ms.
    pub default_ttl_ms: u64,
    /// Upper bound on a submission's own TTL, ms.
    pub max_ttl_ms: u64,
    /// How long terminal requests are kept before purge, ms.
    pub retention_ms: u64,
    /// Submissions a requester may burst.
    pub rate_limit_burst: u64,
    /// One submission token restored per period, ms.
    pub rate_limit_refill_ms: u64,
    /// Random bytes in a security token.
    pub security_token_bytes: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_pending: 100,
            default_ttl_ms: 24 * HOUR_MS,
            max_ttl_ms: 7 * DAY_MS,
            retention_ms: 7 * DAY_MS,
            rate_limit_burst: 5,
            rate_limit_refill_ms: 12 * SECOND_MS,
            security_token_bytes: 32,
        }
    }
}

impl AdmissionConfig {
    /// Small queue and short lifetimes.
    pub fn for_testing() -> Self {
        Self {
            max_pending: 4,
            default_ttl_ms: 10 * MINUTE_MS,
            max_ttl_ms: HOUR_MS,
            ..Self::default()
        }
    }
}
