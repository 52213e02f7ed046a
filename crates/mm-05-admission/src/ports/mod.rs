//! Ports for the admission subsystem.

pub mod inbound;
pub mod outbound;

pub use inbound::AdmissionApi;
pub use outbound::{IdentityVerifier, ResourceReserver, VerifiedIdentity};
