//! # Admission Subsystem
//!
//! **Subsystem ID:** 5
//!
//! ## Purpose
//!
//! Decides whether a node may join a network. Submissions are checked for
//! entitlement (license tier and expiry) and identity (certificate) and then
//! wait in a bounded queue for an admin's verdict. Approval reserves
//! resources and hands back a tier-scaled permission set.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Approval only if tier ≥ network's required tier | `service.rs` - `decide_inner()` via `NetworkPolicy::can_admit()` |
//! | Exactly one terminal status per request | `domain/entities.rs` - `resolve()` only from PENDING |
//! | At most `max_pending` pending requests | `service.rs` - `AdmissionState::check_room()` |
//! | One pending request per (requester, network) | `service.rs` - `AdmissionState::check_room()` |
//! | Raw license keys are never stored | `service.rs` - only `hash_license_key()` output is kept |
//! | One decision in flight per request | `service.rs` - `DecidingGuard` |
//!
//! ## Request Lifecycle
//!
//! ```text
//! submit ──→ PENDING ──decide(approve)──→ APPROVED
//!               │  └───decide(reject)───→ REJECTED
//!               ├──────cancel───────────→ CANCELLED
//!               └──────sweep (ttl)──────→ EXPIRED
//!
//! terminal ──sweep after retention──→ purged
//! ```
//!
//! ## Permissions
//!
//! | Tier | Upload | Sessions | Priority access |
//! |------|--------|----------|-----------------|
//! | FREE | no | 1 | no |
//! | PRO | yes | 5 | no |
//! | ENT | yes | 50 | yes |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::*;
pub use ports::*;
pub use service::{AdmissionController, JOIN_REQUESTS_COLLECTION};
