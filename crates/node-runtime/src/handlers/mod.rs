//! # Event Handlers
//!
//! Long-running subscribers of the control-plane event bus.

pub mod metrics;

pub use metrics::{record, MetricsRecorder};
