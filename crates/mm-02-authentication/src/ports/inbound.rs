//! Driving port.

use crate::domain::{AuthError, Challenge, NodeCredentials, VerificationResult};
use shared_crypto::SigningAlgorithm;
use shared_types::{LicenseInfo, NodeRole};

/// Identity operations offered to admission and the transport layer.
pub trait AuthenticationApi: Send + Sync {
    /// Issue a certificate and key pair for `node_id`.
    fn issue(
        &self,
        node_id: &str,
        role: NodeRole,
        license: Option<&LicenseInfo>,
        algorithm: SigningAlgorithm,
    ) -> Result<NodeCredentials, AuthError>;

    /// Verify a presented certificate. `signature` and `challenge` come as a pair.
    fn verify(
        &self,
        node_id: &str,
        cert_bytes: &[u8],
        signature: Option<&[u8]>,
        challenge: Option<&[u8]>,
    ) -> Result<VerificationResult, AuthError>;

    /// Start a challenge-response exchange.
    fn create_challenge(&self, node_id: &str) -> Challenge;

    /// Complete a challenge-response exchange.
    fn verify_challenge_response(
        &self,
        challenge_id: &str,
        signature: &[u8],
        cert_bytes: &[u8],
    ) -> Result<VerificationResult, AuthError>;

    /// Revoke all certificates of a node.
    fn revoke(&self, node_id: &str) -> Result<usize, AuthError>;
}
