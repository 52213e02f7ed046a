//! # Node Runtime Library
//!
//! Composition root of the model-mesh control plane. The binary in `main.rs`
//! is a thin shell around [`container::ControlPlane`]; everything here is
//! exposed for the integration tests.
//!
//! ## Architectural Patterns
//!
//! - **Hexagonal Architecture**: subsystems define ports, `adapters` implement them
//! - **Event-Driven**: subsystems announce state changes on the event bus only
//! - **Single Composition Root**: each subsystem is built once and shared by `Arc`
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | `container` | `NodeConfig`, `ControlPlane`, persistent certificate authority |
//! | `adapters` | Port implementations connecting subsystems |
//! | `wiring` | `JoinFlow`, cancellable periodic passes |
//! | `handlers` | `MetricsRecorder` bus subscriber |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod container;
pub mod handlers;
pub mod wiring;

pub use container::{ControlPlane, ControlPlaneError, NodeConfig};
