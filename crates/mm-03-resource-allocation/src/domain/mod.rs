//! # Domain Layer - Resource Allocation
//!
//! - `quota`: `ResourceQuota` vector arithmetic
//! - `entities`: requests, allocations, profiles, reports
//! - `strategy`: conflict strategies and fair-share arithmetic
//! - `pool`: `ResourcePool`, the accounting core
//! - `config`, `errors`

pub mod config;
pub mod entities;
pub mod errors;
pub mod pool;
pub mod quota;
pub mod strategy;

pub use config::*;
pub use entities::*;
pub use errors::*;
pub use pool::*;
pub use quota::*;
pub use strategy::*;
