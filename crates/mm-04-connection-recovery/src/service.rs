//! # Connection Recovery Service
//!
//! One [`ConnectionHealth`] per registered connection plus at most one
//! recovery loop per connection. Loops run on tokio, sleep between attempts
//! and exit on shutdown, unregistration, success, exhaustion or an open
//! circuit. The state lock is never held across an `.await`.

use crate::domain::{
    apply_jitter, compute_delay, health_score, update_response_average, ConnectionHealth,
    ConnectionState, RecoveryConfig, RecoveryError, RecoveryEvent, RecoveryEventKind,
    RecoveryStatistics, RecoveryStrategy,
};
use crate::ports::{ConnectionProbe, ConnectionRecoveryApi};
use parking_lot::Mutex;
use shared_bus::{CallbackRegistry, CallbackResult, ControlPlaneEvent, EventPublisher};
use shared_types::{Timestamp, TimeSource};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const SUBSYSTEM: &str = "connection_recovery";

struct Entry {
    health: ConnectionHealth,
    probe: Arc<dyn ConnectionProbe>,
    /// Distinguishes a re-registered connection from its predecessor.
    epoch: u64,
    loop_running: bool,
}

#[derive(Default)]
struct RecoveryState {
    connections: HashMap<String, Entry>,
    log: VecDeque<RecoveryEvent>,
    next_epoch: u64,
    recoveries_started: u64,
    recoveries_succeeded: u64,
    total_recovery_ms: u64,
}

struct Shared {
    config: RecoveryConfig,
    time: Arc<dyn TimeSource>,
    state: Mutex<RecoveryState>,
    callbacks: CallbackRegistry<RecoveryEvent>,
    events: OnceLock<Arc<dyn EventPublisher>>,
    shutdown: watch::Sender<bool>,
}

/// What a recovery loop does next.
enum Step {
    Wait(u64),
    Stop,
}

/// Health tracking and recovery engine. Cloning shares the same state.
#[derive(Clone)]
pub struct ConnectionRecovery {
    shared: Arc<Shared>,
}

impl ConnectionRecovery {
    pub fn new(config: RecoveryConfig, time: Arc<dyn TimeSource>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                callbacks: CallbackRegistry::new(SUBSYSTEM),
                config,
                time,
                state: Mutex::new(RecoveryState::default()),
                events: OnceLock::new(),
                shutdown,
            }),
        }
    }

    /// Publish connection events on `events`. Only the first publisher sticks.
    pub fn with_event_publisher(self, events: Arc<dyn EventPublisher>) -> Self {
        let _ = self.shared.events.set(events);
        self
    }

    /// Register a callback for every recovery event.
    pub fn on_event<F>(&self, label: impl Into<String>, callback: F)
    where
        F: Fn(&RecoveryEvent) -> CallbackResult + Send + Sync + 'static,
    {
        self.shared.callbacks.register(label, callback);
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.shared.config
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Start tracking a connection. It begins CONNECTED.
    pub fn register(
        &self,
        connection_id: &str,
        probe: Arc<dyn ConnectionProbe>,
    ) -> Result<(), RecoveryError> {
        if connection_id.is_empty() {
            return Err(RecoveryError::InvalidRequest("connection id is empty".into()));
        }
        let now = self.shared.time.now();
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if state.connections.contains_key(connection_id) {
            return Err(RecoveryError::AlreadyRegistered(connection_id.to_string()));
        }
        state.next_epoch += 1;
        state.connections.insert(
            connection_id.to_string(),
            Entry {
                health: ConnectionHealth::new(connection_id, now),
                probe,
                epoch: state.next_epoch,
                loop_running: false,
            },
        );
        drop(guard);
        debug!(subsystem = SUBSYSTEM, connection_id = %connection_id, "Connection registered");
        Ok(())
    }

    /// Stop tracking a connection. A running recovery loop exits at its next check.
    pub fn unregister(&self, connection_id: &str) -> Result<ConnectionHealth, RecoveryError> {
        let entry = self
            .shared
            .state
            .lock()
            .connections
            .remove(connection_id)
            .ok_or_else(|| RecoveryError::UnknownConnection(connection_id.to_string()))?;
        debug!(subsystem = SUBSYSTEM, connection_id = %connection_id, "Connection unregistered");
        Ok(entry.health)
    }

    // =========================================================================
    // REPORTS
    // =========================================================================

    /// Record a failure and start recovery unless the circuit is open or a
    /// loop is already running.
    pub fn on_failure(
        &self,
        connection_id: &str,
        reason: &str,
        strategy: RecoveryStrategy,
    ) -> Result<(), RecoveryError> {
        let config = &self.shared.config;
        let now = self.shared.time.now();
        let mut out = Vec::new();
        let spawn_epoch;
        {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;
            let entry = state
                .connections
                .get_mut(connection_id)
                .ok_or_else(|| RecoveryError::UnknownConnection(connection_id.to_string()))?;

            let h = &mut entry.health;
            h.consecutive_failures = h.consecutive_failures.saturating_add(1);
            h.total_failures += 1;
            h.last_failure_at = Some(now);
            h.last_activity_at = now;
            h.last_failure_reason = Some(reason.to_string());
            h.last_strategy = strategy;
            h.stale = false;
            if !h.circuit_breaker_open && h.state != ConnectionState::Reconnecting {
                h.state = ConnectionState::Disconnected;
            }
            out.push(event(connection_id, RecoveryEventKind::ConnectionLost, now, 0, Some(reason)));

            if !h.circuit_breaker_open && h.consecutive_failures >= config.circuit_threshold {
                h.open_circuit(now.saturating_add(config.circuit_timeout_ms));
                out.push(event(connection_id, RecoveryEventKind::CircuitOpened, now, 0, None));
            }
            h.health_score = health_score(h);

            spawn_epoch = if !h.circuit_breaker_open && !entry.loop_running {
                entry.loop_running = true;
                entry.health.recovery_started_at = Some(now);
                state.recoveries_started += 1;
                out.push(event(connection_id, RecoveryEventKind::RecoveryStarted, now, 0, None));
                Some(entry.epoch)
            } else {
                None
            };
            record(state, &out, config.event_log_capacity);
        }

        self.emit(&out);
        if let Some(epoch) = spawn_epoch {
            self.spawn_recovery(connection_id, strategy, epoch);
        }
        Ok(())
    }

    /// Record a success: reset failure counters, fold the response time into
    /// the average and close an open circuit.
    pub fn on_healthy(&self, connection_id: &str, response_time_ms: u64) -> Result<(), RecoveryError> {
        self.mark_healthy(connection_id, response_time_ms, None)
    }

    fn mark_healthy(
        &self,
        connection_id: &str,
        response_time_ms: u64,
        loop_epoch: Option<u64>,
    ) -> Result<(), RecoveryError> {
        let config = &self.shared.config;
        let now = self.shared.time.now();
        let mut out = Vec::new();
        {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;
            let entry = state
                .connections
                .get_mut(connection_id)
                .ok_or_else(|| RecoveryError::UnknownConnection(connection_id.to_string()))?;
            if loop_epoch.is_some_and(|e| e == entry.epoch) {
                entry.loop_running = false;
            }

            let h = &mut entry.health;
            let previous = h.state;
            let attempts = h.recovery_attempts;
            h.total_successes += 1;
            h.avg_response_time_ms = update_response_average(
                h.avg_response_time_ms,
                response_time_ms as f64,
                config.ema_weight,
                h.total_successes == 1,
            );
            if h.circuit_breaker_open {
                out.push(event(connection_id, RecoveryEventKind::CircuitClosed, now, 0, None));
            }
            h.close_circuit(ConnectionState::Connected);
            h.last_success_at = Some(now);
            h.last_activity_at = now;
            h.stale = false;
            h.recovery_attempts = 0;
            h.backoff_delay_ms = 0;
            h.health_score = health_score(h);

            if let Some(started) = h.recovery_started_at.take() {
                state.recoveries_succeeded += 1;
                state.total_recovery_ms += now.saturating_sub(started);
            }
            if previous != ConnectionState::Connected {
                out.push(event(
                    connection_id,
                    RecoveryEventKind::ConnectionRecovered,
                    now,
                    attempts,
                    None,
                ));
            }
            record(state, &out, config.event_log_capacity);
        }
        self.emit(&out);
        Ok(())
    }

    // =========================================================================
    // RECOVERY LOOP
    // =========================================================================

    fn spawn_recovery(&self, connection_id: &str, strategy: RecoveryStrategy, epoch: u64) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let this = self.clone();
                let id = connection_id.to_string();
                handle.spawn(async move { this.recovery_loop(id, strategy, epoch).await });
            }
            Err(_) => {
                warn!(subsystem = SUBSYSTEM, connection_id = %connection_id, "No runtime; recovery not started");
                if let Some(entry) = self.shared.state.lock().connections.get_mut(connection_id) {
                    if entry.epoch == epoch {
                        entry.loop_running = false;
                    }
                }
            }
        }
    }

    async fn recovery_loop(self, connection_id: String, strategy: RecoveryStrategy, epoch: u64) {
        let mut shutdown = self.shared.shutdown.subscribe();
        let mut attempt: u32 = 0;
        debug!(subsystem = SUBSYSTEM, connection_id = %connection_id, ?strategy, "Recovery loop started");

        loop {
            if *shutdown.borrow() {
                self.stop_loop(&connection_id, epoch);
                break;
            }
            let delay = match self.next_step(&connection_id, epoch, attempt, strategy) {
                Step::Wait(delay) => delay,
                Step::Stop => break,
            };
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                _ = shutdown.changed() => {
                    self.stop_loop(&connection_id, epoch);
                    break;
                }
            }

            let Some(probe) = self.begin_attempt(&connection_id, epoch, attempt) else {
                break;
            };
            match probe.reconnect(&connection_id).await {
                Ok(response_time_ms) => {
                    let _ = self.mark_healthy(&connection_id, response_time_ms, Some(epoch));
                    break;
                }
                Err(e) => {
                    self.attempt_failed(&connection_id, epoch, attempt, &e);
                    attempt += 1;
                }
            }
        }
        debug!(subsystem = SUBSYSTEM, connection_id = %connection_id, attempts = attempt, "Recovery loop exited");
    }

    /// Decide whether to keep going and compute the next delay.
    fn next_step(
        &self,
        connection_id: &str,
        epoch: u64,
        attempt: u32,
        strategy: RecoveryStrategy,
    ) -> Step {
        let config = &self.shared.config;
        let now = self.shared.time.now();
        let mut out = Vec::new();
        let step = {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;
            let Some(entry) = state.connections.get_mut(connection_id) else {
                return Step::Stop;
            };
            if entry.epoch != epoch {
                return Step::Stop;
            }
            let h = &mut entry.health;
            if h.circuit_breaker_open || h.state == ConnectionState::Connected {
                entry.loop_running = false;
                Step::Stop
            } else if attempt >= config.max_attempts {
                entry.loop_running = false;
                h.state = ConnectionState::Failed;
                h.recovery_started_at = None;
                h.health_score = health_score(h);
                out.push(event(connection_id, RecoveryEventKind::RecoveryFailed, now, attempt, None));
                record(state, &out, config.event_log_capacity);
                Step::Stop
            } else {
                let delay = compute_delay(strategy, attempt, config);
                h.backoff_delay_ms = delay;
                Step::Wait(apply_jitter(delay, config, &mut rand::thread_rng()))
            }
        };
        self.emit(&out);
        step
    }

    fn begin_attempt(
        &self,
        connection_id: &str,
        epoch: u64,
        attempt: u32,
    ) -> Option<Arc<dyn ConnectionProbe>> {
        let mut state = self.shared.state.lock();
        let entry = state.connections.get_mut(connection_id)?;
        if entry.epoch != epoch {
            return None;
        }
        if entry.health.circuit_breaker_open || entry.health.state == ConnectionState::Connected {
            entry.loop_running = false;
            return None;
        }
        entry.health.state = ConnectionState::Reconnecting;
        entry.health.recovery_attempts = attempt + 1;
        Some(entry.probe.clone())
    }

    fn attempt_failed(&self, connection_id: &str, epoch: u64, attempt: u32, error: &RecoveryError) {
        let config = &self.shared.config;
        let now = self.shared.time.now();
        let mut out = Vec::new();
        {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;
            let Some(entry) = state.connections.get_mut(connection_id) else {
                return;
            };
            if entry.epoch != epoch {
                return;
            }
            let h = &mut entry.health;
            h.consecutive_failures = h.consecutive_failures.saturating_add(1);
            h.total_failures += 1;
            h.last_failure_at = Some(now);
            h.last_activity_at = now;
            h.last_failure_reason = Some(error.to_string());
            let detail = error.to_string();
            out.push(event(
                connection_id,
                RecoveryEventKind::AttemptFailed,
                now,
                attempt + 1,
                Some(&detail),
            ));
            // Attempts are bounded by max_attempts; only reported failures trip the breaker.
            h.health_score = health_score(h);
            record(state, &out, config.event_log_capacity);
        }
        self.emit(&out);
    }

    fn stop_loop(&self, connection_id: &str, epoch: u64) {
        if let Some(entry) = self.shared.state.lock().connections.get_mut(connection_id) {
            if entry.epoch == epoch {
                entry.loop_running = false;
            }
        }
    }

    // =========================================================================
    // PERIODIC PASSES
    // =========================================================================

    /// Close circuits whose timeout elapsed and resume recovery with the last
    /// strategy. Returns how many circuits closed.
    pub fn check_circuit_breakers(&self) -> usize {
        let config = &self.shared.config;
        let now = self.shared.time.now();
        let mut out = Vec::new();
        let mut resume = Vec::new();
        {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;
            let mut started: u64 = 0;
            for (id, entry) in state.connections.iter_mut() {
                let h = &mut entry.health;
                let due = h.circuit_breaker_open && h.circuit_open_until.is_some_and(|t| now >= t);
                if !due {
                    continue;
                }
                h.close_circuit(ConnectionState::Disconnected);
                h.health_score = health_score(h);
                out.push(event(id, RecoveryEventKind::CircuitClosed, now, 0, None));
                if !entry.loop_running {
                    entry.loop_running = true;
                    entry.health.recovery_started_at = Some(now);
                    started += 1;
                    out.push(event(id, RecoveryEventKind::RecoveryStarted, now, 0, None));
                    resume.push((id.clone(), entry.health.last_strategy, entry.epoch));
                }
            }
            state.recoveries_started += started;
            record(state, &out, config.event_log_capacity);
        }

        let closed = out
            .iter()
            .filter(|e| e.kind == RecoveryEventKind::CircuitClosed)
            .count();
        self.emit(&out);
        for (id, strategy, epoch) in resume {
            self.spawn_recovery(&id, strategy, epoch);
        }
        closed
    }

    /// Recompute scores, flag idle connections as stale and return fresh
    /// statistics.
    pub fn run_health_monitor(&self) -> RecoveryStatistics {
        let now = self.shared.time.now();
        let stale_after = self.shared.config.stale_after_ms;
        let mut state = self.shared.state.lock();
        for entry in state.connections.values_mut() {
            let h = &mut entry.health;
            h.stale = now.saturating_sub(h.last_activity_at) > stale_after;
            h.health_score = health_score(h);
        }
        let stats = statistics(&state);
        drop(state);
        if stats.stale > 0 || stats.failed > 0 || stats.circuit_open > 0 {
            info!(
                subsystem = SUBSYSTEM,
                total = stats.total_connections,
                stale = stats.stale,
                failed = stats.failed,
                circuit_open = stats.circuit_open,
                uptime_percent = stats.uptime_percent,
                "Connection health"
            );
        }
        stats
    }

    /// Signal every recovery loop to exit.
    pub fn shutdown(&self) {
        let _ = self.shared.shutdown.send(true);
        info!(subsystem = SUBSYSTEM, "Recovery loops signalled to stop");
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn health(&self, connection_id: &str) -> Option<ConnectionHealth> {
        self.shared
            .state
            .lock()
            .connections
            .get(connection_id)
            .map(|e| e.health.clone())
    }

    pub fn is_circuit_open(&self, connection_id: &str) -> bool {
        self.shared
            .state
            .lock()
            .connections
            .get(connection_id)
            .is_some_and(|e| e.health.circuit_breaker_open)
    }

    /// Whether a recovery loop currently owns the connection.
    pub fn is_recovering(&self, connection_id: &str) -> bool {
        self.shared
            .state
            .lock()
            .connections
            .get(connection_id)
            .is_some_and(|e| e.loop_running)
    }

    pub fn statistics(&self) -> RecoveryStatistics {
        statistics(&self.shared.state.lock())
    }

    /// Most recent `limit` events, oldest first.
    pub fn recent_events(&self, limit: usize) -> Vec<RecoveryEvent> {
        let state = self.shared.state.lock();
        let skip = state.log.len().saturating_sub(limit);
        state.log.iter().skip(skip).cloned().collect()
    }

    // =========================================================================
    // NOTIFICATION
    // =========================================================================

    fn emit(&self, events: &[RecoveryEvent]) {
        for e in events {
            match e.kind {
                RecoveryEventKind::ConnectionLost
                | RecoveryEventKind::CircuitOpened
                | RecoveryEventKind::RecoveryFailed => warn!(
                    subsystem = SUBSYSTEM,
                    connection_id = %e.connection_id,
                    event = e.kind.as_str(),
                    attempt = e.attempt,
                    detail = e.detail.as_deref().unwrap_or(""),
                    "Connection event"
                ),
                RecoveryEventKind::ConnectionRecovered | RecoveryEventKind::CircuitClosed => info!(
                    subsystem = SUBSYSTEM,
                    connection_id = %e.connection_id,
                    event = e.kind.as_str(),
                    attempt = e.attempt,
                    "Connection event"
                ),
                RecoveryEventKind::RecoveryStarted | RecoveryEventKind::AttemptFailed => debug!(
                    subsystem = SUBSYSTEM,
                    connection_id = %e.connection_id,
                    event = e.kind.as_str(),
                    attempt = e.attempt,
                    "Connection event"
                ),
            }
            self.shared.callbacks.fire(e);
            if let (Some(bus), Some(published)) = (self.shared.events.get(), self.to_bus_event(e)) {
                bus.publish(published);
            }
        }
    }

    fn to_bus_event(&self, e: &RecoveryEvent) -> Option<ControlPlaneEvent> {
        let connection_id = e.connection_id.clone();
        match e.kind {
            RecoveryEventKind::ConnectionLost => Some(ControlPlaneEvent::ConnectionLost {
                connection_id,
                reason: e.detail.clone().unwrap_or_default(),
            }),
            RecoveryEventKind::ConnectionRecovered => Some(ControlPlaneEvent::ConnectionRecovered {
                connection_id,
                attempts: e.attempt,
            }),
            RecoveryEventKind::RecoveryFailed => Some(ControlPlaneEvent::RecoveryFailed {
                connection_id,
                attempts: e.attempt,
            }),
            RecoveryEventKind::CircuitOpened => Some(ControlPlaneEvent::CircuitOpened {
                connection_id,
                until: e.at.saturating_add(self.shared.config.circuit_timeout_ms),
            }),
            RecoveryEventKind::CircuitClosed => {
                Some(ControlPlaneEvent::CircuitClosed { connection_id })
            }
            RecoveryEventKind::RecoveryStarted | RecoveryEventKind::AttemptFailed => None,
        }
    }
}

fn event(
    connection_id: &str,
    kind: RecoveryEventKind,
    at: Timestamp,
    attempt: u32,
    detail: Option<&str>,
) -> RecoveryEvent {
    RecoveryEvent {
        connection_id: connection_id.to_string(),
        kind,
        at,
        attempt,
        detail: detail.map(str::to_string),
    }
}

fn record(state: &mut RecoveryState, events: &[RecoveryEvent], capacity: usize) {
    for e in events {
        state.log.push_back(e.clone());
        while state.log.len() > capacity {
            state.log.pop_front();
        }
    }
}

fn statistics(state: &RecoveryState) -> RecoveryStatistics {
    let mut stats = RecoveryStatistics {
        total_connections: state.connections.len(),
        recoveries_started: state.recoveries_started,
        recoveries_succeeded: state.recoveries_succeeded,
        ..RecoveryStatistics::default()
    };
    for entry in state.connections.values() {
        match entry.health.state {
            ConnectionState::Connected => stats.connected += 1,
            ConnectionState::Disconnected | ConnectionState::Reconnecting => stats.disconnected += 1,
            ConnectionState::Failed => stats.failed += 1,
            ConnectionState::CircuitOpen => stats.circuit_open += 1,
        }
        if entry.health.stale {
            stats.stale += 1;
        }
    }
    if state.recoveries_succeeded > 0 {
        stats.average_recovery_time_ms =
            state.total_recovery_ms as f64 / state.recoveries_succeeded as f64;
    }
    if stats.total_connections > 0 {
        stats.uptime_percent = stats.connected as f64 / stats.total_connections as f64 * 100.0;
    }
    stats
}

impl ConnectionRecoveryApi for ConnectionRecovery {
    fn on_failure(
        &self,
        connection_id: &str,
        reason: &str,
        strategy: RecoveryStrategy,
    ) -> Result<(), RecoveryError> {
        ConnectionRecovery::on_failure(self, connection_id, reason, strategy)
    }

    fn on_healthy(&self, connection_id: &str, response_time_ms: u64) -> Result<(), RecoveryError> {
        ConnectionRecovery::on_healthy(self, connection_id, response_time_ms)
    }

    fn is_circuit_open(&self, connection_id: &str) -> bool {
        ConnectionRecovery::is_circuit_open(self, connection_id)
    }

    fn health(&self, connection_id: &str) -> Option<ConnectionHealth> {
        ConnectionRecovery::health(self, connection_id)
    }
}
