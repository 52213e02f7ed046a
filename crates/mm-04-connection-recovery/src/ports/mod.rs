//! Ports for the connection recovery subsystem.

pub mod inbound;
pub mod outbound;

pub use inbound::ConnectionRecoveryApi;
pub use outbound::ConnectionProbe;
