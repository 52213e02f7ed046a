//! Internal certificate authority.
//!
//! The authority signs with Ed25519 regardless of the algorithm of the
//! certificates it issues. Its root certificate is self-signed.

use super::entities::{CertificateBody, NodeCertificate};
use super::errors::AuthError;
use shared_crypto::{verify_signature, NodeKeyPair, SigningAlgorithm};
use shared_types::{NodeRole, Timestamp};

/// Signing authority for node certificates.
pub struct CertificateAuthority {
    name: String,
    key_pair: NodeKeyPair,
    root: NodeCertificate,
}

impl CertificateAuthority {
    /// Fresh authority with a random key.
    pub fn generate(name: &str, now: Timestamp, root_validity_ms: u64) -> Result<Self, AuthError> {
        Self::with_key_pair(
            name,
            NodeKeyPair::generate(SigningAlgorithm::Ed25519),
            now,
            root_validity_ms,
        )
    }

    /// Authority from a persisted 32-byte Ed25519 secret.
    pub fn from_secret(
        name: &str,
        secret: &[u8],
        now: Timestamp,
        root_validity_ms: u64,
    ) -> Result<Self, AuthError> {
        let key_pair = NodeKeyPair::from_secret_bytes(SigningAlgorithm::Ed25519, secret)?;
        Self::with_key_pair(name, key_pair, now, root_validity_ms)
    }

    fn with_key_pair(
        name: &str,
        key_pair: NodeKeyPair,
        now: Timestamp,
        root_validity_ms: u64,
    ) -> Result<Self, AuthError> {
        let body = CertificateBody {
            serial: uuid::Uuid::new_v4().to_string(),
            node_id: name.to_string(),
            role: NodeRole::Admin,
            public_key: key_pair.public_key_bytes(),
            algorithm: SigningAlgorithm::Ed25519,
            license_hash: None,
            issuer: name.to_string(),
            not_before: now,
            not_after: now.saturating_add(root_validity_ms),
        };
        let issuer_signature = key_pair.sign(&body.signing_bytes()?);
        Ok(Self {
            name: name.to_string(),
            key_pair,
            root: NodeCertificate {
                body,
                issuer_signature,
            },
        })
    }

    /// Issuer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Self-signed root certificate.
    pub fn root(&self) -> &NodeCertificate {
        &self.root
    }

    /// Sign a body into a certificate.
    pub fn sign(&self, body: CertificateBody) -> Result<NodeCertificate, AuthError> {
        let issuer_signature = self.key_pair.sign(&body.signing_bytes()?);
        Ok(NodeCertificate {
            body,
            issuer_signature,
        })
    }

    /// Check issuer name and signature.
    pub fn verify(&self, certificate: &NodeCertificate) -> Result<(), AuthError> {
        if certificate.body.issuer != self.name {
            return Err(AuthError::UntrustedIssuer);
        }
        verify_signature(
            SigningAlgorithm::Ed25519,
            &self.root.body.public_key,
            &certificate.body.signing_bytes()?,
            &certificate.issuer_signature,
        )
        .map_err(|_| AuthError::UntrustedIssuer)
    }
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("name", &self.name)
            .field("root_serial", &self.root.body.serial)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_self_signed() {
        let ca = CertificateAuthority::generate("ca", 0, 1_000).unwrap();
        ca.verify(ca.root()).unwrap();
        assert_eq!(ca.root().body.issuer, "ca");
    }

    #[test]
    fn test_other_authority_untrusted() {
        let ca = CertificateAuthority::generate("ca", 0, 1_000).unwrap();
        let impostor = CertificateAuthority::generate("ca", 0, 1_000).unwrap();
        assert_eq!(ca.verify(impostor.root()), Err(AuthError::UntrustedIssuer));
    }

    #[test]
    fn test_from_secret_is_deterministic() {
        let a = CertificateAuthority::from_secret("ca", &[9; 32], 0, 1_000).unwrap();
        let b = CertificateAuthority::from_secret("ca", &[9; 32], 0, 1_000).unwrap();
        // Different roots, same key: each trusts the other's certificates.
        b.verify(a.root()).unwrap();
    }
}
