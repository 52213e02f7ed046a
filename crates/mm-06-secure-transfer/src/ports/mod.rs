//! Ports for the secure transfer subsystem.

pub mod inbound;
pub mod outbound;

pub use inbound::SecureTransferApi;
pub use outbound::{BlockTransport, LinkMonitor, StagingArea, TransferKey, TransferKeyProvider};
