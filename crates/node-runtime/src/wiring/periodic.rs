//! # Periodic Maintenance
//!
//! Every timed pass the subsystems expose runs as its own tokio task and
//! stops when the shutdown flag flips to `true`.
//!
//! | Task | Call | Default interval |
//! |------|------|------------------|
//! | `admission_sweep` | `AdmissionController::sweep` | 1 min |
//! | `key_cleanup` | `KeyManager::cleanup_expired` | 60 min |
//! | `challenge_cleanup` | `AuthenticationManager::cleanup_expired_challenges` | 1 min |
//! | `allocation_pass` | `ResourceAllocator::run_allocation_pass` | 5 s |
//! | `allocation_maintenance` | `ResourceAllocator::run_maintenance` | 1 min |
//! | `health_monitor` | `ConnectionRecovery::run_health_monitor` | 30 s |
//! | `circuit_check` | `ConnectionRecovery::check_circuit_breakers` | 10 s |

use std::time::Duration;

use mesh_telemetry::{log_event, record_error, CIRCUITS_OPEN, PENDING_JOIN_REQUESTS, POOL_UTILIZATION};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::container::ControlPlane;

const SUBSYSTEM: &str = "node_runtime";

/// Run `tick` every `period` until `shutdown` turns `true` or its sender drops.
///
/// The first tick fires one full period after spawning.
pub fn spawn_periodic<F>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if *shutdown.borrow() {
            return;
        }
        loop {
            tokio::select! {
                _ = interval.tick() => tick(),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!(subsystem = SUBSYSTEM, task = name, "Periodic task stopped");
    })
}

/// The running maintenance tasks of one control plane.
pub struct PeriodicTasks {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl PeriodicTasks {
    /// Spawn every pass at the intervals in `plane.config.schedule`.
    pub fn start(plane: &ControlPlane, shutdown: watch::Receiver<bool>) -> Self {
        let schedule = &plane.config.schedule;
        let every = Duration::from_millis;
        let mut handles = Vec::with_capacity(7);

        let admission = plane.admission.clone();
        handles.push((
            "admission_sweep",
            spawn_periodic("admission_sweep", every(schedule.admission_sweep_ms), shutdown.clone(), move || {
                match admission.sweep() {
                    Ok(report) if report.expired > 0 || report.purged > 0 => log_event!(
                        info,
                        "admission",
                        "Join requests swept",
                        expired = report.expired,
                        purged = report.purged
                    ),
                    Ok(_) => {}
                    Err(e) => {
                        record_error("admission", e.reason_code());
                        log_event!(warn, "admission", "Sweep failed", error = %e);
                    }
                }
                PENDING_JOIN_REQUESTS.set(admission.stats().pending as f64);
            }),
        ));

        let keys = plane.keys.clone();
        handles.push((
            "key_cleanup",
            spawn_periodic("key_cleanup", every(schedule.key_cleanup_ms), shutdown.clone(), move || {
                match keys.cleanup_expired() {
                    Ok(report) => log_event!(
                        debug,
                        "key_management",
                        "Key cleanup finished",
                        deprecated = report.deprecated,
                        expired = report.expired,
                        cleared = report.cleared,
                        evicted = report.evicted
                    ),
                    Err(e) => {
                        record_error("key_management", e.reason_code());
                        log_event!(warn, "key_management", "Key cleanup failed", error = %e);
                    }
                }
            }),
        ));

        let auth = plane.auth.clone();
        handles.push((
            "challenge_cleanup",
            spawn_periodic("challenge_cleanup", every(schedule.challenge_cleanup_ms), shutdown.clone(), move || {
                let removed = auth.cleanup_expired_challenges();
                if removed > 0 {
                    log_event!(debug, "authentication", "Expired challenges removed", removed = removed);
                }
            }),
        ));

        let allocator = plane.allocator.clone();
        handles.push((
            "allocation_pass",
            spawn_periodic("allocation_pass", every(schedule.allocation_pass_ms), shutdown.clone(), move || {
                let report = allocator.run_allocation_pass();
                if !report.granted.is_empty() || !report.preempted.is_empty() {
                    log_event!(
                        info,
                        "resource_allocation",
                        "Allocation pass",
                        granted = report.granted.len(),
                        preempted = report.preempted.len(),
                        still_pending = report.still_pending
                    );
                }
            }),
        ));

        let allocator = plane.allocator.clone();
        handles.push((
            "allocation_maintenance",
            spawn_periodic(
                "allocation_maintenance",
                every(schedule.allocation_maintenance_ms),
                shutdown.clone(),
                move || {
                    let report = allocator.run_maintenance();
                    if report.expired_allocations > 0 || report.expired_requests > 0 {
                        log_event!(
                            info,
                            "resource_allocation",
                            "Allocation maintenance",
                            expired_allocations = report.expired_allocations,
                            expired_requests = report.expired_requests,
                            purged = report.purged
                        );
                    }
                    for usage in allocator.utilization().dimensions {
                        POOL_UTILIZATION
                            .with_label_values(&[usage.resource.as_str()])
                            .set(usage.percent);
                    }
                },
            ),
        ));

        let recovery = plane.recovery.clone();
        handles.push((
            "health_monitor",
            spawn_periodic("health_monitor", every(schedule.health_monitor_ms), shutdown.clone(), move || {
                let stats = recovery.run_health_monitor();
                CIRCUITS_OPEN.set(stats.circuit_open as f64);
                if stats.stale > 0 || stats.failed > 0 {
                    log_event!(
                        warn,
                        "connection_recovery",
                        "Unhealthy connections",
                        stale = stats.stale,
                        failed = stats.failed,
                        circuit_open = stats.circuit_open
                    );
                }
            }),
        ));

        let recovery = plane.recovery.clone();
        handles.push((
            "circuit_check",
            spawn_periodic("circuit_check", every(schedule.circuit_check_ms), shutdown, move || {
                let closed = recovery.check_circuit_breakers();
                if closed > 0 {
                    log_event!(info, "connection_recovery", "Circuits closed, recovery resumed", count = closed);
                }
            }),
        ));

        log_event!(info, SUBSYSTEM, "Periodic tasks started", tasks = handles.len());
        Self { handles }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.handles.iter().map(|(name, _)| *name).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every task to stop. Call after signalling shutdown.
    pub async fn join(self) {
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                log_event!(warn, SUBSYSTEM, "Periodic task ended abnormally", task = name, error = %e);
            }
        }
    }
}
