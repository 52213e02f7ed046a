//! Certificates, credentials and challenges.

use super::errors::AuthError;
use bincode::Options;
use serde::{Deserialize, Serialize};
use shared_crypto::{NodeKeyPair, SigningAlgorithm};
use shared_types::{NodeId, NodeRole, Timestamp};

/// Upper bound on an encoded certificate.
pub const MAX_CERTIFICATE_LEN: u64 = 16 * 1024;

fn codec() -> impl Options {
    bincode::options().with_limit(MAX_CERTIFICATE_LEN)
}

/// Signed portion of a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateBody {
    pub serial: String,
    pub node_id: NodeId,
    pub role: NodeRole,
    pub public_key: Vec<u8>,
    pub algorithm: SigningAlgorithm,
    /// SHA-256 hex of the license the node was admitted with.
    pub license_hash: Option<String>,
    pub issuer: String,
    pub not_before: Timestamp,
    pub not_after: Timestamp,
}

impl CertificateBody {
    /// Bytes the issuer signs.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, AuthError> {
        codec()
            .serialize(self)
            .map_err(|e| AuthError::Malformed(e.to_string()))
    }
}

/// A certificate as exchanged on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCertificate {
    pub body: CertificateBody,
    pub issuer_signature: Vec<u8>,
}

impl NodeCertificate {
    /// Encode for transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AuthError> {
        codec()
            .serialize(self)
            .map_err(|e| AuthError::Malformed(e.to_string()))
    }

    /// Decode from transport.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AuthError> {
        if bytes.is_empty() {
            return Err(AuthError::Malformed("empty certificate".into()));
        }
        codec()
            .deserialize(bytes)
            .map_err(|e| AuthError::Malformed(e.to_string()))
    }

    /// Serial number.
    pub fn serial(&self) -> &str {
        &self.body.serial
    }
}

/// Registry entry for an issued certificate. Public data only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub certificate: NodeCertificate,
    pub issued_at: Timestamp,
    pub revoked: bool,
    pub revoked_at: Option<Timestamp>,
}

/// What a node receives at provisioning.
#[derive(Debug)]
pub struct NodeCredentials {
    pub certificate: NodeCertificate,
    /// Encoded certificate, ready to present.
    pub cert_bytes: Vec<u8>,
    key_pair: NodeKeyPair,
}

impl NodeCredentials {
    pub(crate) fn new(certificate: NodeCertificate, cert_bytes: Vec<u8>, key_pair: NodeKeyPair) -> Self {
        Self {
            certificate,
            cert_bytes,
            key_pair,
        }
    }

    /// Sign with the node's private key, e.g. to answer a challenge.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.key_pair.sign(message)
    }

    /// Node the credentials belong to.
    pub fn node_id(&self) -> &str {
        &self.certificate.body.node_id
    }
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub node_id: NodeId,
    pub role: NodeRole,
    pub license_hash: Option<String>,
    pub serial: String,
    pub algorithm: SigningAlgorithm,
    pub expires_at: Timestamp,
    /// True when a challenge signature was checked.
    pub proof_of_possession: bool,
}

/// Outstanding challenge.
#[derive(Debug, Clone)]
pub(crate) struct PendingChallenge {
    pub node_id: NodeId,
    pub challenge: Vec<u8>,
    pub attempts: u32,
    pub expires_at: Timestamp,
}

/// Challenge handed to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub challenge_id: String,
    pub challenge: Vec<u8>,
    pub expires_at: Timestamp,
}
