//! Backoff delays and jitter.

use super::config::RecoveryConfig;
use super::entities::RecoveryStrategy;
use rand::Rng;

/// Pre-jitter delay before reconnect attempt `attempt` (0-based), ms.
pub fn compute_delay(strategy: RecoveryStrategy, attempt: u32, config: &RecoveryConfig) -> u64 {
    let raw = match strategy {
        RecoveryStrategy::Exponential => {
            let factor = config.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
            let delay = config.base_delay_ms as f64 * factor;
            if delay.is_finite() && delay < config.max_delay_ms as f64 {
                delay as u64
            } else {
                config.max_delay_ms
            }
        }
        RecoveryStrategy::Linear => config
            .base_delay_ms
            .saturating_add(u64::from(attempt).saturating_mul(config.linear_step_ms)),
        RecoveryStrategy::Immediate => config.immediate_delay_ms,
    };
    raw.min(config.max_delay_ms)
}

/// Scale `delay_ms` up or down by a random fraction in
/// `[jitter_min, jitter_max]`.
pub fn apply_jitter<R: Rng>(delay_ms: u64, config: &RecoveryConfig, rng: &mut R) -> u64 {
    let (lo, hi) = if config.jitter_min <= config.jitter_max {
        (config.jitter_min, config.jitter_max)
    } else {
        (config.jitter_max, config.jitter_min)
    };
    let magnitude = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
    let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    let jittered = delay_ms as f64 * (1.0 + sign * magnitude);
    if jittered <= 0.0 {
        0
    } else {
        jittered.round() as u64
    }
}
