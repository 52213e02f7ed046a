//! Recovery configuration.

use shared_types::{MINUTE_MS, SECOND_MS};

/// Backoff, circuit breaker and health monitor settings.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// First delay of exponential and linear backoff, ms.
    pub base_delay_ms: u64,
    /// Cap on any pre-jitter delay, ms.
    pub max_delay_ms: u64,
    /// Growth factor of exponential backoff.
    pub multiplier: f64,
    /// Increment per attempt of linear backoff, ms.
    pub linear_step_ms: u64,
    /// Fixed delay of immediate recovery, ms.
    pub immediate_delay_ms: u64,
    /// Jitter magnitude range as a fraction of the delay.
    pub jitter_min: f64,
    pub jitter_max: f64,
    /// Reconnect attempts before a connection is FAILED.
    pub max_attempts: u32,
    /// Consecutive failures that open the circuit.
    pub circuit_threshold: u32,
    /// How long a circuit stays open, ms.
    pub circuit_timeout_ms: u64,
    /// Idle time after which a connection counts as stale, ms.
    pub stale_after_ms: u64,
    /// Weight of a new sample in the response-time average.
    pub ema_weight: f64,
    /// Recovery events kept in memory.
    pub event_log_capacity: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: SECOND_MS,
            max_delay_ms: 5 * MINUTE_MS,
            multiplier: 2.0,
            linear_step_ms: 2 * SECOND_MS,
            immediate_delay_ms: 100,
            jitter_min: 0.1,
            jitter_max: 0.5,
            max_attempts: 10,
            circuit_threshold: 5,
            circuit_timeout_ms: MINUTE_MS,
            stale_after_ms: 5 * MINUTE_MS,
            ema_weight: 0.1,
            event_log_capacity: 1000,
        }
    }
}

impl RecoveryConfig {
    /// Few attempts and short delays for tests.
    pub fn for_testing() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: 2 * SECOND_MS,
            max_attempts: 3,
            event_log_capacity: 16,
            ..Self::default()
        }
    }
}
