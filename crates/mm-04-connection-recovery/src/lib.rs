//! # Connection Recovery Subsystem
//!
//! **Subsystem ID:** 4
//!
//! ## Purpose
//!
//! Tracks the health of every logical connection the node holds and brings
//! failed connections back with jittered backoff. A circuit breaker stops
//! hammering links that keep failing.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | At most one recovery loop per connection | `service.rs` - `loop_running` flag, epoch check |
//! | `circuit_breaker_open ⇔ state == CIRCUIT_OPEN` | `domain/entities.rs` - `open_circuit()`/`close_circuit()` |
//! | No reconnect attempts while the circuit is open | `service.rs` - `next_step()`, `begin_attempt()` |
//! | Delays never exceed `max_delay_ms` before jitter | `domain/backoff.rs` - `compute_delay()` |
//! | Score within `[0, 100]` | `domain/health.rs` - `health_score()` |
//! | Bounded event log | `service.rs` - `record()` |
//!
//! ## Lifecycle
//!
//! ```text
//! on_failure ──→ DISCONNECTED ──loop──→ RECONNECTING ──probe ok──→ CONNECTED
//!      │                                     │
//!      │                                     └─ max_attempts ──→ FAILED
//!      └─ consecutive ≥ threshold ──→ CIRCUIT_OPEN
//!                                        │
//!            check_circuit_breakers() ───┴─ timeout ──→ DISCONNECTED (loop resumes)
//! ```
//!
//! Only `on_failure` reports count toward the breaker threshold. Failed
//! reconnect attempts count toward `max_attempts`, so a loop that never
//! succeeds always ends in FAILED.
//!
//! Loops exit on shutdown, unregistration, success, exhaustion or an open
//! circuit. The composition root drives `check_circuit_breakers()` and
//! `run_health_monitor()` on timers.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::*;
pub use ports::*;
pub use service::ConnectionRecovery;
