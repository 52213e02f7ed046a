//! # Wiring
//!
//! Work that spans several subsystems once the control plane is built.
//!
//! ```text
//!              ┌────────────────────── ControlPlane ──────────────────────┐
//!              │                                                          │
//!  JoinFlow ──►│ licenses ─► auth ─► admission ─► allocator ─► keys ─►    │
//!              │                                    transfer ─► transport │
//!              │                                                          │
//!  Periodic ──►│ sweep · cleanup · allocation pass · health · circuits    │
//!              └──────────────────────────────────────────────────────────┘
//! ```

pub mod join_flow;
pub mod periodic;

pub use join_flow::{JoinFlow, JoinFlowError, JoinOutcome, ModelDelivery};
pub use periodic::{spawn_periodic, PeriodicTasks};
