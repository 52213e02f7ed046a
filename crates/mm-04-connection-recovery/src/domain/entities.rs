//! Connection health, recovery events and statistics.

use serde::{Deserialize, Serialize};
use shared_types::Timestamp;
use std::fmt;

/// Liveness state of one logical connection.
///
/// ```text
/// CONNECTED ⇄ DISCONNECTED → RECONNECTING → CONNECTED | RECONNECTING | FAILED
///      └──── threshold failures ────→ CIRCUIT_OPEN ──timeout──→ DISCONNECTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,
    Failed,
    CircuitOpen,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Reconnecting => "RECONNECTING",
            ConnectionState::Failed => "FAILED",
            ConnectionState::CircuitOpen => "CIRCUIT_OPEN",
        };
        f.write_str(s)
    }
}

/// Backoff policy of a recovery loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStrategy {
    /// `base × multiplier^attempt`, capped.
    #[default]
    Exponential,
    /// `base + attempt × step`, capped.
    Linear,
    /// Minimal fixed delay.
    Immediate,
}

/// Health record of one connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionHealth {
    pub connection_id: String,
    pub state: ConnectionState,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub total_successes: u64,
    /// Reconnect attempts made by the current recovery loop.
    pub recovery_attempts: u32,
    /// Last pre-jitter backoff delay, ms.
    pub backoff_delay_ms: u64,
    pub circuit_breaker_open: bool,
    pub circuit_open_until: Option<Timestamp>,
    /// Exponential moving average, ms.
    pub avg_response_time_ms: f64,
    /// 0 to 100.
    pub health_score: f64,
    pub last_strategy: RecoveryStrategy,
    pub registered_at: Timestamp,
    pub last_activity_at: Timestamp,
    pub last_failure_at: Option<Timestamp>,
    pub last_success_at: Option<Timestamp>,
    pub last_failure_reason: Option<String>,
    /// When the running recovery started.
    pub recovery_started_at: Option<Timestamp>,
    /// Idle longer than the stale threshold at the last monitor pass.
    pub stale: bool,
}

impl ConnectionHealth {
    /// Fresh, connected record.
    pub fn new(connection_id: impl Into<String>, now: Timestamp) -> Self {
        Self {
            connection_id: connection_id.into(),
            state: ConnectionState::Connected,
            consecutive_failures: 0,
            total_failures: 0,
            total_successes: 0,
            recovery_attempts: 0,
            backoff_delay_ms: 0,
            circuit_breaker_open: false,
            circuit_open_until: None,
            avg_response_time_ms: 0.0,
            health_score: 100.0,
            last_strategy: RecoveryStrategy::default(),
            registered_at: now,
            last_activity_at: now,
            last_failure_at: None,
            last_success_at: None,
            last_failure_reason: None,
            recovery_started_at: None,
            stale: false,
        }
    }

    /// Share of reported outcomes that were failures.
    pub fn failure_rate(&self) -> f64 {
        let total = self.total_failures + self.total_successes;
        if total == 0 {
            0.0
        } else {
            self.total_failures as f64 / total as f64
        }
    }

    /// Open the breaker until `until`.
    pub(crate) fn open_circuit(&mut self, until: Timestamp) {
        self.state = ConnectionState::CircuitOpen;
        self.circuit_breaker_open = true;
        self.circuit_open_until = Some(until);
    }

    /// Close the breaker and start counting failures afresh.
    pub(crate) fn close_circuit(&mut self, next: ConnectionState) {
        self.state = next;
        self.circuit_breaker_open = false;
        self.circuit_open_until = None;
        self.consecutive_failures = 0;
    }
}

/// Kind of a recovery event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryEventKind {
    ConnectionLost,
    RecoveryStarted,
    AttemptFailed,
    ConnectionRecovered,
    RecoveryFailed,
    CircuitOpened,
    CircuitClosed,
}

impl RecoveryEventKind {
    /// Label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryEventKind::ConnectionLost => "connection_lost",
            RecoveryEventKind::RecoveryStarted => "recovery_started",
            RecoveryEventKind::AttemptFailed => "attempt_failed",
            RecoveryEventKind::ConnectionRecovered => "connection_recovered",
            RecoveryEventKind::RecoveryFailed => "recovery_failed",
            RecoveryEventKind::CircuitOpened => "circuit_opened",
            RecoveryEventKind::CircuitClosed => "circuit_closed",
        }
    }
}

/// One entry of the recovery log. Also the callback payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEvent {
    pub connection_id: String,
    pub kind: RecoveryEventKind,
    pub at: Timestamp,
    /// Attempt number where relevant.
    pub attempt: u32,
    /// Failure reason, when there is one.
    pub detail: Option<String>,
}

/// Aggregate view across all connections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryStatistics {
    pub total_connections: usize,
    pub connected: usize,
    /// DISCONNECTED or RECONNECTING.
    pub disconnected: usize,
    pub failed: usize,
    pub circuit_open: usize,
    pub stale: usize,
    pub recoveries_started: u64,
    pub recoveries_succeeded: u64,
    pub average_recovery_time_ms: f64,
    /// Share of connections currently CONNECTED.
    pub uptime_percent: f64,
}
