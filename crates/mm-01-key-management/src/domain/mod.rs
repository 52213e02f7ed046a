//! # Domain Layer - Key Management
//!
//! - `entities`: `ManagedKey`, `KeyStatus`, `KeyMetadata`, rotation and revocation records
//! - `derivation`: hardware salt, PBKDF2 and HKDF inputs
//! - `config`: `KeyManagerConfig`
//! - `errors`: `KeyError`

pub mod config;
pub mod derivation;
pub mod entities;
pub mod errors;

pub use config::*;
pub use entities::*;
pub use errors::*;
