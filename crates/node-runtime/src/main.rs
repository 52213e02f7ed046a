//! # Model-Mesh Control Plane Node
//!
//! Entry point of one control-plane node.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from `MM_*` environment variables and validate it
//! 2. Install logging and register metrics
//! 3. Build the tokio runtime with `runtime.worker_threads` workers
//! 4. Build the control plane (reloads persisted keys, certificates, requests)
//! 5. Start the metrics recorder and the periodic passes
//! 6. Run until Ctrl+C, then signal shutdown and wait for every task

use std::sync::Arc;

use anyhow::{Context, Result};
use mesh_telemetry::{init_telemetry, log_event, TelemetryConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use node_runtime::container::{ControlPlane, NodeConfig};
use node_runtime::handlers::MetricsRecorder;
use node_runtime::wiring::PeriodicTasks;

const SUBSYSTEM: &str = "node_runtime";

/// A running node: the control plane plus its background tasks.
pub struct NodeRuntime {
    plane: Arc<ControlPlane>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    periodic: Option<PeriodicTasks>,
    recorder: Option<JoinHandle<u64>>,
}

impl NodeRuntime {
    pub fn new(config: NodeConfig) -> Result<Self> {
        let plane = ControlPlane::open(config).context("failed to build the control plane")?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            plane: Arc::new(plane),
            shutdown_tx,
            shutdown_rx,
            periodic: None,
            recorder: None,
        })
    }

    /// Start the metrics recorder and the periodic passes.
    pub fn start(&mut self) {
        log_event!(info, SUBSYSTEM, "===========================================");
        log_event!(info, SUBSYSTEM, "  Model-Mesh Control Plane v0.1.0");
        log_event!(info, SUBSYSTEM, "===========================================");

        let recorder = MetricsRecorder::new(&self.plane.bus);
        self.recorder = Some(tokio::spawn(recorder.run(self.shutdown_rx.clone())));
        self.periodic = Some(PeriodicTasks::start(&self.plane, self.shutdown_rx.clone()));

        log_event!(
            info,
            SUBSYSTEM,
            "Node ready",
            data_dir = %self.plane.config.storage.data_dir.display(),
            in_memory = self.plane.config.storage.in_memory
        );
    }

    /// Signal every task to stop and wait for them.
    pub async fn shutdown(mut self) {
        log_event!(info, SUBSYSTEM, "Initiating graceful shutdown...");
        if self.shutdown_tx.send(true).is_err() {
            log_event!(warn, SUBSYSTEM, "No task was listening for shutdown");
        }
        if let Some(periodic) = self.periodic.take() {
            periodic.join().await;
        }
        if let Some(recorder) = self.recorder.take() {
            match recorder.await {
                Ok(recorded) => log_event!(info, SUBSYSTEM, "Metrics recorder drained", events = recorded),
                Err(e) => log_event!(warn, SUBSYSTEM, "Metrics recorder ended abnormally", error = %e),
            }
        }
        self.plane.shutdown();
        log_event!(info, SUBSYSTEM, "Shutdown complete");
    }
}

fn main() -> Result<()> {
    let config = NodeConfig::from_env().context("invalid MM_* environment")?;
    config.validate().context("invalid node configuration")?;

    let _telemetry = init_telemetry(TelemetryConfig::from_env()).context("failed to initialize telemetry")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.runtime.worker_threads)
        .enable_all()
        .build()
        .context("failed to build the tokio runtime")?;

    runtime.block_on(async move {
        let mut node = NodeRuntime::new(config)?;
        node.start();

        log_event!(info, SUBSYSTEM, "Node is running. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c().await.context("failed to listen for Ctrl+C")?;

        node.shutdown().await;
        Ok(())
    })
}
