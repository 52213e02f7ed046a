//! Ports for the authentication subsystem.

pub mod inbound;

pub use inbound::AuthenticationApi;
