//! # Authentication Subsystem
//!
//! **Subsystem ID:** 2
//!
//! ## Purpose
//!
//! Runs the network's internal certificate authority. Nodes receive a
//! certificate binding their id, role and license to a public key, and later
//! prove identity by presenting it, optionally with a signature over a fresh
//! challenge.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Only this authority's signatures are trusted | `domain/ca.rs` - `verify()` |
//! | Revoked certificates never verify | `service.rs` - registry lookup in `verify_inner()` |
//! | Private keys never reach the store | `domain/entities.rs` - `CertificateRecord` holds public data |
//! | Challenges are single use | `service.rs` - removed on success, expiry or exhaustion |
//! | Revocation keeps history | `service.rs` - `revoke()` flags records, never deletes |
//!
//! ## Challenge Flow
//!
//! ```text
//! node                          AuthenticationManager
//!  │ ── create_challenge(id) ──→ │  32 random bytes, 5 min TTL
//!  │ ←──────── challenge ─────── │
//!  │ ── sign(challenge) + cert ─→│  verify(); failure counts an attempt
//!  │ ←──── VerificationResult ── │  3 failures discard the challenge
//! ```
//!
//! ## Certificate Encoding
//!
//! Certificates travel as length-limited bincode. The issuer signs the
//! encoded `CertificateBody`; the signature is carried beside it.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::*;
pub use ports::*;
pub use service::{AuthenticationManager, CERTIFICATES_COLLECTION};
