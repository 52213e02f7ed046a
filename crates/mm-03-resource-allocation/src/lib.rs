//! # Resource Allocation Subsystem
//!
//! **Subsystem ID:** 3
//!
//! ## Purpose
//!
//! Tracks a global pool of compute quota and arbitrates it between networks.
//! Requests are validated up front, queued, and granted by periodic passes.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | `allocated + available == total` per dimension | `domain/pool.rs` - `grant()`/`end()` |
//! | Network usage within `min(peak, base × factor)` | `domain/pool.rs` - `can_grant()`, `plan_preemption()` |
//! | Tier slot caps | `domain/pool.rs` - `validate()` |
//! | Fair shares fit the already-reduced pool | `domain/strategy.rs` - `fair_share()` |
//! | Quota returned exactly once | `domain/pool.rs` - `end()` only acts on ACTIVE |
//!
//! ## Allocation Pass
//!
//! ```text
//! pending ──sort (priority, time)──→ greedy grant ──residue──→ strategy
//!                                                              ├─ PriorityBased: preempt lower priority
//!                                                              ├─ FairShare: split remaining pool
//!                                                              └─ FCFS: stay queued
//! ```
//!
//! ## Tier Caps
//!
//! | Tier | Worker slots | Client slots |
//! |------|--------------|--------------|
//! | FREE | 2 | 3 |
//! | PRO | 10 | 20 |
//! | ENT | 100 | 1000 |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::*;
pub use ports::*;
pub use service::ResourceAllocator;
