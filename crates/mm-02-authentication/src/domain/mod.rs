//! # Domain Layer - Authentication
//!
//! - `entities`: certificates, credentials, challenges
//! - `ca`: `CertificateAuthority`
//! - `config`: `AuthConfig`
//! - `errors`: `AuthError`

pub mod ca;
pub mod config;
pub mod entities;
pub mod errors;

pub use ca::*;
pub use config::*;
pub use entities::*;
pub use errors::*;
