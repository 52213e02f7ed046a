//! # Cross-Subsystem Scenarios
//!
//! Each module drives a wired control plane through one path that spans
//! several subsystems:
//!
//! | Module | Subsystems | Path |
//! |--------|------------|------|
//! | `capacity` | 3, 5 | tier caps, release, fair share under contention |
//! | `entitlement` | 5, 3, 1 | tier mismatch refused before any reservation |
//! | `recovery` | 4, 6 | dead link opens the circuit, timeout resumes recovery |
//! | `transfer` | 6, 1, 4 | refused blocks retried, offline node staged |
//! | `join` | 2, 5, 3, 6, 1 | provision → submit → approve → decrypt |
//! | `persistence` | 1, 2, 5, 6 | restart over the same store resumes state |

pub mod capacity;
pub mod entitlement;
pub mod join;
pub mod persistence;
pub mod recovery;
pub mod transfer;
