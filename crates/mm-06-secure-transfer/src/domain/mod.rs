//! # Domain Layer - Secure Transfer
//!
//! - `entities`: sessions, per-block bookkeeping, progress snapshots
//! - `message`: sealed block wire format, `seal_block` / `open_block`
//! - `config`, `errors`

pub mod config;
pub mod entities;
pub mod errors;
pub mod message;

pub use config::*;
pub use entities::*;
pub use errors::*;
pub use message::*;
