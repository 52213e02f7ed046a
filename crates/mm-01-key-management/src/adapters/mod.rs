//! Adapters for Key Management outbound ports.

pub mod fingerprint;

pub use fingerprint::SystemFingerprintProvider;
