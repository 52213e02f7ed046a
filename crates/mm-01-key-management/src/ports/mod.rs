//! Ports layer for Key Management.
//!
//! - Inbound (driving): `KeyManagementApi`
//! - Outbound (driven): `HardwareFingerprintProvider`, `KeyRotationNotifier`

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
