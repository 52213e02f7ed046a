//! # Shared Bus
//!
//! Notification plumbing between the control-plane subsystems and their
//! collaborators.
//!
//! ```text
//! ┌──────────────┐  fire()   ┌──────────────────┐  publish()  ┌──────────────┐
//! │  Subsystem   │ ────────→ │ CallbackRegistry │ ──────────→ │  Event Bus   │
//! └──────────────┘           └──────────────────┘             └──────┬───────┘
//!                                                                    │ subscribe()
//!                                                         metrics / audit handlers
//! ```
//!
//! - **Callbacks** are fire-and-forget. A failing or panicking callback is
//!   logged and never reaches the component that fired it.
//! - **Event bus** is a `tokio::sync::broadcast` channel; slow subscribers lag
//!   and skip rather than apply backpressure.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod callbacks;
pub mod events;
pub mod publisher;
pub mod subscriber;

pub use callbacks::{CallbackRegistry, CallbackResult, FireReport};
pub use events::{ControlPlaneEvent, EventFilter, EventTopic};
pub use publisher::{BusStats, EventPublisher, InMemoryEventBus};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
