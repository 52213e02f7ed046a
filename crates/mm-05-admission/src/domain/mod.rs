//! # Domain Layer - Admission
//!
//! - `entities`: `JoinRequest`, `ApprovalDecision`, `NetworkPolicy`, permissions
//! - `queue`: listing order of pending requests
//! - `config`, `errors`

pub mod config;
pub mod entities;
pub mod errors;
pub mod queue;

pub use config::*;
pub use entities::*;
pub use errors::*;
pub use queue::*;
