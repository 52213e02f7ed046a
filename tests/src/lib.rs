//! # Model-Mesh Test Suite
//!
//! Cross-subsystem scenarios run against a fully wired
//! [`node_runtime::ControlPlane`], plus benchmarks of the hot paths.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/
//! │   ├── fixtures.rs        # Plane builder, licenses, simulated nodes
//! │   └── integration/
//! │       ├── capacity.rs    # Tier caps, release, fair share
//! │       ├── entitlement.rs # Tier mismatch leaves nothing behind
//! │       ├── recovery.rs    # Circuit breaker around a dead link
//! │       ├── transfer.rs    # Retried blocks, staged delivery
//! │       ├── join.rs        # Provision → submit → approve → decrypt
//! │       └── persistence.rs # Restart over an on-disk store
//! └── benches/
//!     └── control_plane_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p mm-tests
//!
//! # One scenario group
//! cargo test -p mm-tests integration::recovery::
//!
//! # Benchmarks
//! cargo bench -p mm-tests
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod fixtures;
pub mod integration;
