//! # Shared Types Crate
//!
//! Common vocabulary for the control-plane subsystems.
//!
//! ## Contents
//!
//! | Module | Provides |
//! |--------|----------|
//! | `entities` | `LicenseTier`, `LicenseInfo`, `NodeRole`, identifier aliases |
//! | `errors` | `ErrorCategory`, `StorageError` |
//! | `time` | `TimeSource` port and `SystemTimeSource` |
//! | `storage` | `KeyValueStore` port, `InMemoryStore`, `JsonFileStore` |
//! | `rate_limiter` | Token bucket and per-key token buckets |
//! | `license` | `LicenseValidator` port for the external license service |

pub mod entities;
pub mod errors;
pub mod license;
pub mod rate_limiter;
pub mod storage;
pub mod time;

pub use entities::*;
pub use errors::{ErrorCategory, StorageError};
pub use license::{LicenseError, LicenseValidator};
pub use rate_limiter::{KeyedRateLimiter, RateLimiter};
pub use storage::{InMemoryStore, JsonFileStore, KeyValueStore};
pub use time::{SystemTimeSource, TimeSource};

#[cfg(any(test, feature = "test-utils"))]
pub use time::MockTimeSource;
