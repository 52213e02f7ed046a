//! # Mesh Telemetry
//!
//! Structured logging and Prometheus metrics for the control plane.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mesh_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MM_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `MM_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `MM_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `MM_SERVICE_NAME` | `model-mesh` | Service name |
//! | `MM_NETWORK` | `devnet` | Deployment network |

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::{LogFormat, TelemetryConfig};
pub use metrics::{
    encode_metrics, record_error, register_metrics, HistogramTimer, ALLOCATIONS,
    CERTIFICATES_ISSUED, CIRCUITS_OPEN, CONNECTION_EVENTS, EVENT_BUS_MESSAGES,
    IDENTITY_REJECTIONS, JOIN_REQUESTS, KEY_OPERATIONS, PENDING_JOIN_REQUESTS, POOL_UTILIZATION,
    SUBSYSTEM_ERRORS, TRANSFER_BLOCK_DURATION, TRANSFER_PROGRESS, TRANSFER_SESSIONS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that should be held for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    tracing_setup::init_tracing(&config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Increment a metric, optionally with label values.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_inc_macro() {
        metric_inc!(KEY_OPERATIONS, &["derived"]);
        assert!(KEY_OPERATIONS.with_label_values(&["derived"]).get() >= 1.0);
    }

    #[test]
    fn test_init_twice_fails_on_subscriber() {
        let config = TelemetryConfig {
            format: LogFormat::Silent,
            ..TelemetryConfig::default()
        };
        let first = init_telemetry(config.clone());
        let second = init_telemetry(config);
        // Only one global subscriber can exist per process.
        assert!(first.is_err() || second.is_err());
    }
}
