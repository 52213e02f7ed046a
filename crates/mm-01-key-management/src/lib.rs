//! # Key Management Subsystem
//!
//! **Subsystem ID:** 1
//!
//! ## Purpose
//!
//! Derives, rotates, revokes and retires symmetric keys that protect model
//! blocks. Keys are bound to the machine that derived them: the PBKDF2 salt
//! comes from a hardware fingerprint, so the same license on another host
//! cannot reproduce the key.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Fingerprint never changes after creation | `service.rs` - set once in `derive()`, never rewritten |
//! | At most one ACTIVE storage key per model | `service.rs` - `live_storage_key()` checked before and after derivation |
//! | One rotation in flight | `service.rs` - `RotationGuard` |
//! | Store before cache | `service.rs` - every mutation calls `persist_key()` first |
//! | Audit records survive cleanup | `service.rs` - `cleanup_expired()` evicts from cache only |
//!
//! ## Lifecycle
//!
//! ```text
//! [ACTIVE] ──rotate──→ [ROTATING] ──overlap (7d)──→ [DEPRECATED] ──grace (1d)──→ [EXPIRED]
//!     │                     │                             │
//!     └──────────── revoke ─┴─────────────────────────────┴──────────────→ [REVOKED]
//! ```
//!
//! Material is zeroized when a key leaves ACTIVE/ROTATING.
//!
//! ## Outbound Dependencies
//!
//! | Port | Purpose |
//! |------|---------|
//! | `KeyValueStore` | Key records, rotation log, revocation list |
//! | `TimeSource` | Expiry decisions |
//! | `HardwareFingerprintProvider` | Machine binding |
//! | `KeyRotationNotifier` | Best-effort client notices |
//! | `EventPublisher` | `KeyDerived`, `KeyRotated`, `KeyRevoked` |
//!
//! ## Module Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/fingerprint.rs - SystemFingerprintProvider            │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/inbound.rs  - KeyManagementApi                           │
//! │  ports/outbound.rs - HardwareFingerprintProvider, notifier      │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service.rs - KeyManager (cache + store, rotation, cleanup)     │
//! │  domain/    - entities, derivation, config, errors              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::SystemFingerprintProvider;
pub use domain::*;
pub use ports::*;
pub use service::{KeyManager, KEYS_COLLECTION, REVOCATIONS_COLLECTION, ROTATION_LOG_COLLECTION};
