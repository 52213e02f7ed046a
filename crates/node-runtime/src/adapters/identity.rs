use mm_02_authentication::AuthenticationManager;
use mm_05_admission::{IdentityVerifier, VerifiedIdentity};
use std::sync::Arc;

/// Admission's certificate check, answered by the authentication subsystem.
///
/// Only the certificate itself is checked here. Proof of possession goes
/// through the challenge flow before the request is submitted.
#[derive(Clone)]
pub struct CertificateIdentityVerifier {
    auth: Arc<AuthenticationManager>,
}

impl CertificateIdentityVerifier {
    pub fn new(auth: Arc<AuthenticationManager>) -> Self {
        Self { auth }
    }
}

impl IdentityVerifier for CertificateIdentityVerifier {
    fn verify_identity(&self, node_id: &str, certificate: &[u8]) -> Result<VerifiedIdentity, String> {
        self.auth
            .verify(node_id, certificate, None, None)
            .map(|verified| VerifiedIdentity {
                role: verified.role,
                license_hash: verified.license_hash,
            })
            .map_err(|e| e.reason_code().to_string())
    }
}
