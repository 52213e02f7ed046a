//! # Shared Crypto
//!
//! Cryptographic primitives used by the control plane.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `symmetric` | AES-256-GCM | Model block encryption |
//! | `hashing` | SHA-256 | Block checksums, fingerprints, license hashes |
//! | `kdf` | PBKDF2-HMAC-SHA256, HKDF-SHA256 | Hardware-bound and session keys |
//! | `signing` | Ed25519, secp256k1 ECDSA | Certificates and challenge proofs |
//!
//! Sealed payloads are laid out as `nonce (12) ‖ ciphertext ‖ tag (16)`,
//! which is also the byte string a block message carries base64-encoded.
//! [`SecretKey`] zeroizes its bytes on drop.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod errors;
pub mod hashing;
pub mod kdf;
pub mod signing;
pub mod symmetric;

pub use errors::CryptoError;
pub use hashing::{sha256, sha256_hex, verify_sha256_hex};
pub use kdf::{hkdf_expand, pbkdf2_derive};
pub use signing::{verify_signature, NodeKeyPair, SigningAlgorithm};
pub use symmetric::{open, seal, SecretKey, NONCE_LEN, TAG_LEN};
