//! Driven ports.
//!
//! The license validator itself lives in `shared_types` since key management
//! consumes it too.

use crate::domain::{JoinRequest, Permissions};
use async_trait::async_trait;
use shared_types::NodeRole;

/// What a certificate check establishes about a requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub role: NodeRole,
    /// License hash bound into the certificate, if any.
    pub license_hash: Option<String>,
}

/// Checks a requester's certificate.
pub trait IdentityVerifier: Send + Sync {
    /// Err carries a reason code.
    fn verify_identity(&self, node_id: &str, certificate: &[u8]) -> Result<VerifiedIdentity, String>;
}

/// Reserves resources for an approved request.
#[async_trait]
pub trait ResourceReserver: Send + Sync {
    /// Returns the allocation id. Err carries the refusal reason.
    async fn reserve(&self, request: &JoinRequest, permissions: &Permissions) -> Result<String, String>;

    /// Give back a reservation whose approval could not be committed.
    async fn release(&self, allocation_id: &str) -> Result<(), String>;
}
