//! # Authentication Service
//!
//! Certificate issuance, verification, challenge-response and revocation.
//!
//! ## Verification Steps
//!
//! | Step | Failure |
//! |------|---------|
//! | Decode | `Malformed` |
//! | Issuer name and CA signature | `UntrustedIssuer` |
//! | Subject matches claimed node | `NodeMismatch` |
//! | Registry lookup | `UnknownCertificate`, `Revoked` |
//! | Validity window | `NotYetValid`, `Expired` |
//! | Signature over challenge (optional) | `SignatureMismatch` |

use crate::domain::entities::PendingChallenge;
use crate::domain::{
    AuthConfig, AuthError, CertificateAuthority, CertificateBody, CertificateRecord, Challenge,
    NodeCertificate, NodeCredentials, VerificationResult,
};
use crate::ports::AuthenticationApi;
use parking_lot::Mutex;
use rand::RngCore;
use shared_bus::{ControlPlaneEvent, EventPublisher};
use shared_crypto::{verify_signature, NodeKeyPair, SigningAlgorithm};
use shared_types::storage::{load_all, save_record};
use shared_types::{KeyValueStore, LicenseInfo, NodeRole, TimeSource};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SUBSYSTEM: &str = "authentication";

/// Store collection for issued certificates.
pub const CERTIFICATES_COLLECTION: &str = "certificates";

#[derive(Default)]
struct AuthState {
    certificates: HashMap<String, CertificateRecord>,
    challenges: HashMap<String, PendingChallenge>,
}

/// Certificate authority plus verification front end.
pub struct AuthenticationManager {
    config: AuthConfig,
    ca: CertificateAuthority,
    store: Arc<dyn KeyValueStore>,
    time: Arc<dyn TimeSource>,
    events: Option<Arc<dyn EventPublisher>>,
    state: Mutex<AuthState>,
}

impl AuthenticationManager {
    /// Manager with a freshly generated authority.
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn KeyValueStore>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, AuthError> {
        let ca = CertificateAuthority::generate(&config.ca_name, time.now(), config.root_validity_ms)?;
        Ok(Self::with_authority(config, ca, store, time))
    }

    /// Manager around an existing authority.
    pub fn with_authority(
        config: AuthConfig,
        ca: CertificateAuthority,
        store: Arc<dyn KeyValueStore>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        info!(subsystem = SUBSYSTEM, ca = %ca.name(), root_serial = %ca.root().serial(), "Certificate authority ready");
        Self {
            config,
            ca,
            store,
            time,
            events: None,
            state: Mutex::new(AuthState::default()),
        }
    }

    /// Publish identity events on `events`.
    pub fn with_event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Hydrate the certificate registry from the store.
    pub fn load(&self) -> Result<usize, AuthError> {
        let records: Vec<CertificateRecord> = load_all(self.store.as_ref(), CERTIFICATES_COLLECTION)?;
        let mut state = self.state.lock();
        state.certificates = records
            .into_iter()
            .map(|r| (r.certificate.body.serial.clone(), r))
            .collect();
        Ok(state.certificates.len())
    }

    /// Issue a certificate and key pair for a node.
    pub fn issue(
        &self,
        node_id: &str,
        role: NodeRole,
        license: Option<&LicenseInfo>,
        algorithm: SigningAlgorithm,
    ) -> Result<NodeCredentials, AuthError> {
        if node_id.is_empty() {
            return Err(AuthError::InvalidRequest("node id is empty".into()));
        }
        let now = self.time.now();
        let key_pair = NodeKeyPair::generate(algorithm);
        let body = CertificateBody {
            serial: uuid::Uuid::new_v4().to_string(),
            node_id: node_id.to_string(),
            role,
            public_key: key_pair.public_key_bytes(),
            algorithm,
            license_hash: license.map(|l| l.license_hash.clone()),
            issuer: self.ca.name().to_string(),
            not_before: now,
            not_after: now.saturating_add(self.config.certificate_validity_ms),
        };
        let certificate = self.ca.sign(body)?;
        let cert_bytes = certificate.to_bytes()?;

        let record = CertificateRecord {
            certificate: certificate.clone(),
            issued_at: now,
            revoked: false,
            revoked_at: None,
        };
        {
            let mut state = self.state.lock();
            save_record(
                self.store.as_ref(),
                CERTIFICATES_COLLECTION,
                certificate.serial(),
                &record,
            )?;
            state
                .certificates
                .insert(certificate.serial().to_string(), record);
        }

        info!(
            subsystem = SUBSYSTEM,
            node_id = %node_id,
            serial = %certificate.serial(),
            %role,
            ?algorithm,
            "Issued node certificate"
        );
        self.publish(ControlPlaneEvent::CertificateIssued {
            node_id: node_id.to_string(),
            serial: certificate.serial().to_string(),
            role,
        });
        Ok(NodeCredentials::new(certificate, cert_bytes, key_pair))
    }

    /// Verify a certificate and, optionally, a signature over a challenge.
    pub fn verify(
        &self,
        node_id: &str,
        cert_bytes: &[u8],
        signature: Option<&[u8]>,
        challenge: Option<&[u8]>,
    ) -> Result<VerificationResult, AuthError> {
        let proof = match (signature, challenge) {
            (Some(sig), Some(ch)) => Some((sig, ch)),
            (None, None) => None,
            _ => {
                return Err(AuthError::InvalidRequest(
                    "signature and challenge must be supplied together".into(),
                ))
            }
        };
        let result = self.verify_inner(node_id, cert_bytes, proof);
        if let Err(e) = &result {
            self.report_rejection(node_id, cert_bytes, e);
        }
        result
    }

    fn verify_inner(
        &self,
        node_id: &str,
        cert_bytes: &[u8],
        proof: Option<(&[u8], &[u8])>,
    ) -> Result<VerificationResult, AuthError> {
        let certificate = NodeCertificate::from_bytes(cert_bytes)?;
        self.ca.verify(&certificate)?;

        let body = &certificate.body;
        if body.node_id != node_id {
            return Err(AuthError::NodeMismatch {
                expected: node_id.to_string(),
                actual: body.node_id.clone(),
            });
        }

        {
            let state = self.state.lock();
            match state.certificates.get(&body.serial) {
                None => return Err(AuthError::UnknownCertificate(body.serial.clone())),
                Some(record) if record.revoked => {
                    return Err(AuthError::Revoked {
                        serial: body.serial.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        let now = self.time.now();
        if now < body.not_before {
            return Err(AuthError::NotYetValid {
                not_before: body.not_before,
            });
        }
        if now >= body.not_after {
            return Err(AuthError::Expired {
                not_after: body.not_after,
            });
        }

        if body.public_key.len() != body.algorithm.public_key_len() {
            return Err(AuthError::Malformed(format!(
                "{:?} public key must be {} bytes",
                body.algorithm,
                body.algorithm.public_key_len()
            )));
        }
        if let Some((signature, challenge)) = proof {
            verify_signature(body.algorithm, &body.public_key, challenge, signature)
                .map_err(|_| AuthError::SignatureMismatch)?;
        }

        debug!(subsystem = SUBSYSTEM, node_id = %node_id, serial = %body.serial, "Certificate verified");
        Ok(VerificationResult {
            node_id: body.node_id.clone(),
            role: body.role,
            license_hash: body.license_hash.clone(),
            serial: body.serial.clone(),
            algorithm: body.algorithm,
            expires_at: body.not_after,
            proof_of_possession: proof.is_some(),
        })
    }

    /// Start a proof-of-possession exchange.
    pub fn create_challenge(&self, node_id: &str) -> Challenge {
        let mut bytes = vec![0u8; self.config.challenge_len];
        rand::thread_rng().fill_bytes(&mut bytes);
        let challenge_id = uuid::Uuid::new_v4().to_string();
        let expires_at = self.time.now().saturating_add(self.config.challenge_timeout_ms);

        self.state.lock().challenges.insert(
            challenge_id.clone(),
            PendingChallenge {
                node_id: node_id.to_string(),
                challenge: bytes.clone(),
                attempts: 0,
                expires_at,
            },
        );
        debug!(subsystem = SUBSYSTEM, node_id = %node_id, challenge_id = %challenge_id, "Challenge created");
        Challenge {
            challenge_id,
            challenge: bytes,
            expires_at,
        }
    }

    /// Check a node's signature over its challenge.
    ///
    /// A failed response counts against the attempt budget. Once the budget
    /// is spent or the challenge times out it is discarded.
    pub fn verify_challenge_response(
        &self,
        challenge_id: &str,
        signature: &[u8],
        cert_bytes: &[u8],
    ) -> Result<VerificationResult, AuthError> {
        let now = self.time.now();
        let pending = {
            let mut state = self.state.lock();
            let pending = state
                .challenges
                .get(challenge_id)
                .cloned()
                .ok_or_else(|| AuthError::ChallengeNotFound(challenge_id.to_string()))?;
            if now >= pending.expires_at {
                state.challenges.remove(challenge_id);
                return Err(AuthError::ChallengeExpired);
            }
            if pending.attempts >= self.config.max_challenge_attempts {
                state.challenges.remove(challenge_id);
                return Err(AuthError::ChallengeExhausted {
                    attempts: pending.attempts,
                });
            }
            pending
        };

        let result = self.verify(
            &pending.node_id,
            cert_bytes,
            Some(signature),
            Some(&pending.challenge),
        );

        let mut state = self.state.lock();
        match &result {
            Ok(_) => {
                state.challenges.remove(challenge_id);
            }
            Err(_) => {
                let exhausted = match state.challenges.get_mut(challenge_id) {
                    Some(entry) => {
                        entry.attempts += 1;
                        entry.attempts >= self.config.max_challenge_attempts
                    }
                    None => false,
                };
                if exhausted {
                    state.challenges.remove(challenge_id);
                    debug!(subsystem = SUBSYSTEM, challenge_id = %challenge_id, "Challenge invalidated after failed attempts");
                }
            }
        }
        result
    }

    /// Drop expired challenges. Returns how many were removed.
    pub fn cleanup_expired_challenges(&self) -> usize {
        let now = self.time.now();
        let mut state = self.state.lock();
        let before = state.challenges.len();
        state.challenges.retain(|_, c| now < c.expires_at);
        let removed = before - state.challenges.len();
        if removed > 0 {
            debug!(subsystem = SUBSYSTEM, removed, "Expired challenges removed");
        }
        removed
    }

    /// Revoke every certificate of a node. History is kept.
    pub fn revoke(&self, node_id: &str) -> Result<usize, AuthError> {
        let now = self.time.now();
        let mut state = self.state.lock();
        let serials: Vec<String> = state
            .certificates
            .values()
            .filter(|r| r.certificate.body.node_id == node_id)
            .map(|r| r.certificate.body.serial.clone())
            .collect();
        if serials.is_empty() {
            return Err(AuthError::UnknownNode(node_id.to_string()));
        }

        let mut revoked = 0;
        for serial in serials {
            let Some(record) = state.certificates.get(&serial) else {
                continue;
            };
            if record.revoked {
                continue;
            }
            let mut updated = record.clone();
            updated.revoked = true;
            updated.revoked_at = Some(now);
            save_record(self.store.as_ref(), CERTIFICATES_COLLECTION, &serial, &updated)?;
            state.certificates.insert(serial, updated);
            revoked += 1;
        }
        drop(state);

        warn!(subsystem = SUBSYSTEM, node_id = %node_id, certificates = revoked, "Node certificates revoked");
        self.publish(ControlPlaneEvent::CertificateRevoked {
            node_id: node_id.to_string(),
            certificates: revoked,
        });
        Ok(revoked)
    }

    /// The authority's self-signed root.
    pub fn ca_certificate(&self) -> NodeCertificate {
        self.ca.root().clone()
    }

    /// Every certificate issued to a node, oldest first.
    pub fn certificates_for(&self, node_id: &str) -> Vec<CertificateRecord> {
        let state = self.state.lock();
        let mut records: Vec<CertificateRecord> = state
            .certificates
            .values()
            .filter(|r| r.certificate.body.node_id == node_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.issued_at);
        records
    }

    /// Number of outstanding challenges.
    pub fn pending_challenges(&self) -> usize {
        self.state.lock().challenges.len()
    }

    fn report_rejection(&self, node_id: &str, cert_bytes: &[u8], error: &AuthError) {
        let serial = NodeCertificate::from_bytes(cert_bytes)
            .map(|c| c.body.serial)
            .unwrap_or_else(|_| "-".to_string());
        warn!(
            subsystem = SUBSYSTEM,
            node_id = %node_id,
            serial = %serial,
            reason = error.reason_code(),
            "Identity rejected"
        );
        self.publish(ControlPlaneEvent::IdentityRejected {
            node_id: node_id.to_string(),
            reason: error.reason_code().to_string(),
        });
    }

    fn publish(&self, event: ControlPlaneEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

impl AuthenticationApi for AuthenticationManager {
    fn issue(
        &self,
        node_id: &str,
        role: NodeRole,
        license: Option<&LicenseInfo>,
        algorithm: SigningAlgorithm,
    ) -> Result<NodeCredentials, AuthError> {
        AuthenticationManager::issue(self, node_id, role, license, algorithm)
    }

    fn verify(
        &self,
        node_id: &str,
        cert_bytes: &[u8],
        signature: Option<&[u8]>,
        challenge: Option<&[u8]>,
    ) -> Result<VerificationResult, AuthError> {
        AuthenticationManager::verify(self, node_id, cert_bytes, signature, challenge)
    }

    fn create_challenge(&self, node_id: &str) -> Challenge {
        AuthenticationManager::create_challenge(self, node_id)
    }

    fn verify_challenge_response(
        &self,
        challenge_id: &str,
        signature: &[u8],
        cert_bytes: &[u8],
    ) -> Result<VerificationResult, AuthError> {
        AuthenticationManager::verify_challenge_response(self, challenge_id, signature, cert_bytes)
    }

    fn revoke(&self, node_id: &str) -> Result<usize, AuthError> {
        AuthenticationManager::revoke(self, node_id)
    }
}

#[cfg(test)]
mod tests;
