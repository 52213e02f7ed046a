//! # Secure Transfer Subsystem
//!
//! **Subsystem ID:** 6
//!
//! ## Purpose
//!
//! Moves a model to a client as a session of independently tracked blocks.
//! Each block is checked against its stored checksum, sealed with
//! AES-256-GCM under a session key from key management, and sent over the
//! client's transport (or staged when the client is offline). Failed blocks
//! are retried with exponential backoff; a session can be resumed without
//! resending what already arrived.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Session COMPLETED only if every block is COMPLETED | `service.rs` - `finalize()` |
//! | At most `max_concurrent_blocks` blocks in flight | `service.rs` - shared `Semaphore` |
//! | Fresh nonce per sealed block | `domain/message.rs` - `seal_block()` |
//! | Corrupt payload rejected before decryption | `domain/message.rs` - `open_block()` |
//! | Resume never resends COMPLETED blocks | `service.rs` - `resume()` |
//! | `retry_count` equals failed attempts | `service.rs` - `BlockWorker::run_block()` |
//!
//! ## Block Lifecycle
//!
//! ```text
//! PENDING ──permit──→ IN_PROGRESS ──ack──────────────→ COMPLETED
//!    │                    │  └──error, retries left──┐
//!    │                    │        (backoff)         │
//!    │                    │  ←───────────────────────┘
//!    │                    └──retries exhausted───────→ FAILED ──resume──→ PENDING
//!    └──────cancel───────────────────────────────────→ CANCELLED ─resume─→ PENDING
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{StagedBlock, StoreStagingArea, STAGED_BLOCKS_COLLECTION};
pub use domain::*;
pub use ports::*;
pub use service::SecureTransferManager;
