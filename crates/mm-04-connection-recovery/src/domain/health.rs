//! Health scoring.

use super::entities::ConnectionHealth;

/// Response time above which a connection is slow, ms.
pub const SLOW_RESPONSE_MS: f64 = 1_000.0;
/// Response time above which a connection is very slow, ms.
pub const VERY_SLOW_RESPONSE_MS: f64 = 5_000.0;

/// Score in `[0, 100]`.
///
/// Starts at 100 and subtracts up to 40 for the failure rate, 10 per
/// consecutive failure (at most 30), 30 for an open circuit and 10 or 20 for
/// slow responses.
pub fn health_score(health: &ConnectionHealth) -> f64 {
    let mut score = 100.0;
    score -= health.failure_rate() * 40.0;
    score -= (f64::from(health.consecutive_failures) * 10.0).min(30.0);
    if health.circuit_breaker_open {
        score -= 30.0;
    }
    if health.avg_response_time_ms > VERY_SLOW_RESPONSE_MS {
        score -= 20.0;
    } else if health.avg_response_time_ms > SLOW_RESPONSE_MS {
        score -= 10.0;
    }
    score.clamp(0.0, 100.0)
}

/// Fold a new response-time sample into the moving average.
pub fn update_response_average(current: f64, sample_ms: f64, weight: f64, first_sample: bool) -> f64 {
    if first_sample {
        sample_ms
    } else {
        current * (1.0 - weight) + sample_ms * weight
    }
}
