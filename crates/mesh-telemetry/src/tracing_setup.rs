//! Global subscriber installation.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;
use crate::{TelemetryConfig, TelemetryError};

/// Install the process-wide subscriber. Fails if one is already set.
pub(crate) fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .map_err(|e| TelemetryError::TracerInit(format!("bad log filter {:?}: {e}", config.log_filter)))?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Silent => registry.try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false).with_thread_ids(true))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().compact().with_target(true)).try_init(),
    };
    installed.map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        network = %config.network,
        format = ?config.format,
        "Logging initialized"
    );
    Ok(())
}
