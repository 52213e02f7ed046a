//! # Domain Layer - Connection Recovery
//!
//! - `entities`: `ConnectionHealth`, `RecoveryEvent`, statistics
//! - `backoff`: delay policies and jitter
//! - `health`: score and response-time average
//! - `config`, `errors`

pub mod backoff;
pub mod config;
pub mod entities;
pub mod errors;
pub mod health;

pub use backoff::*;
pub use config::*;
pub use entities::*;
pub use errors::*;
pub use health::*;
