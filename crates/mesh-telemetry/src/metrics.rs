//! Prometheus metrics for the control plane.
//!
//! All metrics follow the naming convention: `mm_<subsystem>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts,
    Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // ADMISSION METRICS (Subsystem 5)
    // =========================================================================

    /// Join requests by outcome
    pub static ref JOIN_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("mm_admission_join_requests_total", "Join requests by outcome"),
        &["outcome"]  // submitted/approved/rejected/expired
    ).expect("metric creation failed");

    /// Join requests waiting for an admin
    pub static ref PENDING_JOIN_REQUESTS: Gauge = Gauge::new(
        "mm_admission_pending_requests",
        "Join requests in the pending queue"
    ).expect("metric creation failed");

    // =========================================================================
    // AUTHENTICATION METRICS (Subsystem 2)
    // =========================================================================

    /// Certificates issued
    pub static ref CERTIFICATES_ISSUED: CounterVec = CounterVec::new(
        Opts::new("mm_auth_certificates_issued_total", "Node certificates issued"),
        &["role"]
    ).expect("metric creation failed");

    /// Identity rejections by reason
    pub static ref IDENTITY_REJECTIONS: CounterVec = CounterVec::new(
        Opts::new("mm_auth_identity_rejections_total", "Failed certificate or challenge checks"),
        &["reason"]
    ).expect("metric creation failed");

    // =========================================================================
    // KEY MANAGEMENT METRICS (Subsystem 1)
    // =========================================================================

    /// Key lifecycle operations
    pub static ref KEY_OPERATIONS: CounterVec = CounterVec::new(
        Opts::new("mm_keys_operations_total", "Key lifecycle operations"),
        &["operation"]  // derived/rotated/revoked
    ).expect("metric creation failed");

    // =========================================================================
    // SECURE TRANSFER METRICS (Subsystem 6)
    // =========================================================================

    /// Transfer sessions by outcome
    pub static ref TRANSFER_SESSIONS: CounterVec = CounterVec::new(
        Opts::new("mm_transfer_sessions_total", "Transfer sessions by outcome"),
        &["outcome"]  // completed/failed
    ).expect("metric creation failed");

    /// Latest reported progress, percent
    pub static ref TRANSFER_PROGRESS: Gauge = Gauge::new(
        "mm_transfer_last_progress_percent",
        "Progress of the most recently reporting session"
    ).expect("metric creation failed");

    /// Block send duration
    pub static ref TRANSFER_BLOCK_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "mm_transfer_block_send_duration_seconds",
            "Time from first send attempt to acknowledged block"
        ).buckets(exponential_buckets(0.001, 2.0, 15).unwrap_or_default())
    ).expect("metric creation failed");

    // =========================================================================
    // RESOURCE ALLOCATION METRICS (Subsystem 3)
    // =========================================================================

    /// Allocation lifecycle
    pub static ref ALLOCATIONS: CounterVec = CounterVec::new(
        Opts::new("mm_resources_allocations_total", "Allocation lifecycle events"),
        &["event"]  // granted/released
    ).expect("metric creation failed");

    /// Pool utilization per resource, percent
    pub static ref POOL_UTILIZATION: GaugeVec = GaugeVec::new(
        Opts::new("mm_resources_pool_utilization_percent", "Share of the global pool in use"),
        &["resource"]
    ).expect("metric creation failed");

    // =========================================================================
    // CONNECTION RECOVERY METRICS (Subsystem 4)
    // =========================================================================

    /// Connection events
    pub static ref CONNECTION_EVENTS: CounterVec = CounterVec::new(
        Opts::new("mm_recovery_connection_events_total", "Connection lifecycle events"),
        &["event"]  // lost/recovered/failed/circuit_opened/circuit_closed
    ).expect("metric creation failed");

    /// Circuits currently open
    pub static ref CIRCUITS_OPEN: Gauge = Gauge::new(
        "mm_recovery_circuits_open",
        "Connections with an open circuit breaker"
    ).expect("metric creation failed");

    // =========================================================================
    // EVENT BUS METRICS
    // =========================================================================

    /// Events observed on the bus
    pub static ref EVENT_BUS_MESSAGES: CounterVec = CounterVec::new(
        Opts::new("mm_eventbus_messages_total", "Events observed on the bus"),
        &["topic"]
    ).expect("metric creation failed");

    // =========================================================================
    // ERROR METRICS
    // =========================================================================

    /// Subsystem errors by reason code
    pub static ref SUBSYSTEM_ERRORS: CounterVec = CounterVec::new(
        Opts::new("mm_subsystem_errors_total", "Errors by subsystem and reason code"),
        &["subsystem", "reason"]
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; already registered collectors are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Admission
        Box::new(JOIN_REQUESTS.clone()),
        Box::new(PENDING_JOIN_REQUESTS.clone()),
        // Authentication
        Box::new(CERTIFICATES_ISSUED.clone()),
        Box::new(IDENTITY_REJECTIONS.clone()),
        // Keys
        Box::new(KEY_OPERATIONS.clone()),
        // Transfer
        Box::new(TRANSFER_SESSIONS.clone()),
        Box::new(TRANSFER_PROGRESS.clone()),
        Box::new(TRANSFER_BLOCK_DURATION.clone()),
        // Resources
        Box::new(ALLOCATIONS.clone()),
        Box::new(POOL_UTILIZATION.clone()),
        // Recovery
        Box::new(CONNECTION_EVENTS.clone()),
        Box::new(CIRCUITS_OPEN.clone()),
        // Event bus
        Box::new(EVENT_BUS_MESSAGES.clone()),
        // Errors
        Box::new(SUBSYSTEM_ERRORS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Record an error by subsystem and reason code.
pub fn record_error(subsystem: &str, reason: &str) {
    SUBSYSTEM_ERRORS.with_label_values(&[subsystem, reason]).inc();
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
