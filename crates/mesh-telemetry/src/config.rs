//! Telemetry settings read from `MM_*` variables.

use std::env;

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colored.
    Pretty,
    /// One JSON object per line, for a log shipper tailing stdout.
    Json,
    /// Nothing written; spans and events are still filtered and counted.
    Silent,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Stamped on the startup line and the shutdown line.
    pub service_name: String,
    /// `EnvFilter` directive, e.g. `info` or `mm_04_connection_recovery=debug,info`.
    pub log_filter: String,
    pub format: LogFormat,
    /// Deployment the node belongs to (devnet, staging, production).
    pub network: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "model-mesh".to_string(),
            log_filter: "info".to_string(),
            format: LogFormat::Pretty,
            network: "devnet".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Defaults overridden by `MM_SERVICE_NAME`, `MM_LOG_LEVEL` (or `RUST_LOG`),
    /// `MM_JSON_LOGS`, `MM_CONSOLE_OUTPUT` and `MM_NETWORK`.
    ///
    /// JSON is the default format inside a container.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let in_container = var("KUBERNETES_SERVICE_HOST").is_some() || var("DOCKER_CONTAINER").is_some();
        let json = var("MM_JSON_LOGS").map_or(in_container, |v| truthy(&v));
        let console = var("MM_CONSOLE_OUTPUT").map_or(true, |v| truthy(&v));

        Self {
            service_name: var("MM_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_filter: var("MM_LOG_LEVEL")
                .or_else(|| var("RUST_LOG"))
                .unwrap_or(defaults.log_filter),
            format: match (console, json) {
                (false, _) => LogFormat::Silent,
                (true, true) => LogFormat::Json,
                (true, false) => LogFormat::Pretty,
            },
            network: var("MM_NETWORK").unwrap_or(defaults.network),
        }
    }
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
