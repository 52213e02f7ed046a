use super::*;
use shared_bus::{EventFilter, EventTopic, InMemoryEventBus};
use shared_types::{InMemoryStore, LicenseTier, MockTimeSource, DAY_MS, SECOND_MS};

const T0: u64 = 1_700_000_000_000;

struct Harness {
    auth: AuthenticationManager,
    store: Arc<InMemoryStore>,
    clock: Arc<MockTimeSource>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(MockTimeSource::new(T0));
    let auth = AuthenticationManager::new(AuthConfig::for_testing(), store.clone(), clock.clone())
        .unwrap();
    Harness { auth, store, clock }
}

fn license() -> LicenseInfo {
    LicenseInfo {
        tier: LicenseTier::Pro,
        expires_at: T0 + 30 * DAY_MS,
        max_clients: 20,
        allowed_models: vec![],
        license_hash: "ab".repeat(32),
    }
}

// ===== TEST GROUP 1: Issuance and basic verification =====

#[test]
fn test_issue_and_verify_ed25519() {
    let h = harness();
    let creds = h
        .auth
        .issue("node-1", NodeRole::Worker, Some(&license()), SigningAlgorithm::Ed25519)
        .unwrap();

    let result = h.auth.verify("node-1", &creds.cert_bytes, None, None).unwrap();
    assert_eq!(result.node_id, "node-1");
    assert_eq!(result.role, NodeRole::Worker);
    assert_eq!(result.license_hash, Some("ab".repeat(32)));
    assert_eq!(result.expires_at, T0 + DAY_MS);
    assert!(!result.proof_of_possession);
}

#[test]
fn test_issue_and_verify_secp256k1_with_proof() {
    let h = harness();
    let creds = h
        .auth
        .issue("node-2", NodeRole::Client, None, SigningAlgorithm::Secp256k1)
        .unwrap();
    assert_eq!(creds.certificate.body.public_key.len(), 33);

    let challenge = b"prove-it";
    let sig = creds.sign(challenge);
    let result = h
        .auth
        .verify("node-2", &creds.cert_bytes, Some(&sig), Some(challenge))
        .unwrap();
    assert!(result.proof_of_possession);
    assert_eq!(result.algorithm, SigningAlgorithm::Secp256k1);
}

#[test]
fn test_issue_rejects_empty_node_id() {
    let h = harness();
    let err = h
        .auth
        .issue("", NodeRole::Worker, None, SigningAlgorithm::Ed25519)
        .unwrap_err();
    assert_eq!(err.reason_code(), "auth_invalid_request");
}

#[test]
fn test_each_issue_gets_fresh_serial() {
    let h = harness();
    let a = h.auth.issue("n", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    let b = h.auth.issue("n", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    assert_ne!(a.certificate.serial(), b.certificate.serial());
    assert_eq!(h.auth.certificates_for("n").len(), 2);
}

// ===== TEST GROUP 2: Verification failures =====

#[test]
fn test_garbage_bytes_are_malformed() {
    let h = harness();
    let err = h.auth.verify("node-1", b"not a cert", None, None).unwrap_err();
    assert!(matches!(err, AuthError::Malformed(_)));
}

#[test]
fn test_tampered_certificate_untrusted() {
    let h = harness();
    let creds = h.auth.issue("node-1", NodeRole::Client, None, SigningAlgorithm::Ed25519).unwrap();

    let mut cert = NodeCertificate::from_bytes(&creds.cert_bytes).unwrap();
    cert.body.role = NodeRole::Admin;
    let forged = cert.to_bytes().unwrap();

    assert_eq!(
        h.auth.verify("node-1", &forged, None, None),
        Err(AuthError::UntrustedIssuer)
    );
}

#[test]
fn test_foreign_authority_untrusted() {
    let h = harness();
    let other = harness();
    let creds = other
        .auth
        .issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519)
        .unwrap();
    assert_eq!(
        h.auth.verify("node-1", &creds.cert_bytes, None, None),
        Err(AuthError::UntrustedIssuer)
    );
}

#[test]
fn test_node_mismatch() {
    let h = harness();
    let creds = h.auth.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    let err = h.auth.verify("node-9", &creds.cert_bytes, None, None).unwrap_err();
    assert_eq!(
        err,
        AuthError::NodeMismatch {
            expected: "node-9".into(),
            actual: "node-1".into()
        }
    );
}

#[test]
fn test_unregistered_certificate_from_same_key() {
    // Two managers share a CA key but not a registry.
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(MockTimeSource::new(T0));
    let issuer = AuthenticationManager::with_authority(
        AuthConfig::for_testing(),
        CertificateAuthority::from_secret("model-mesh-ca", &[3; 32], T0, DAY_MS).unwrap(),
        Arc::new(InMemoryStore::new()),
        clock.clone(),
    );
    let verifier = AuthenticationManager::with_authority(
        AuthConfig::for_testing(),
        CertificateAuthority::from_secret("model-mesh-ca", &[3; 32], T0, DAY_MS).unwrap(),
        store,
        clock,
    );

    let creds = issuer.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    let err = verifier.verify("node-1", &creds.cert_bytes, None, None).unwrap_err();
    assert_eq!(err, AuthError::UnknownCertificate(creds.certificate.serial().to_string()));
}

#[test]
fn test_expired_certificate() {
    let h = harness();
    let creds = h.auth.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();

    h.clock.advance(DAY_MS - 1);
    assert!(h.auth.verify("node-1", &creds.cert_bytes, None, None).is_ok());

    h.clock.advance(1);
    assert_eq!(
        h.auth.verify("node-1", &creds.cert_bytes, None, None),
        Err(AuthError::Expired { not_after: T0 + DAY_MS })
    );
}

#[test]
fn test_not_yet_valid_after_clock_moves_back() {
    let h = harness();
    let creds = h.auth.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    h.clock.set(T0 - 1);
    assert_eq!(
        h.auth.verify("node-1", &creds.cert_bytes, None, None),
        Err(AuthError::NotYetValid { not_before: T0 })
    );
}

#[test]
fn test_wrong_signature_mismatch() {
    let h = harness();
    let creds = h.auth.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    let imposter = h.auth.issue("node-2", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();

    let sig = imposter.sign(b"challenge");
    assert_eq!(
        h.auth.verify("node-1", &creds.cert_bytes, Some(&sig), Some(b"challenge")),
        Err(AuthError::SignatureMismatch)
    );
}

#[test]
fn test_signature_without_challenge_rejected() {
    let h = harness();
    let creds = h.auth.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    let sig = creds.sign(b"x");
    let err = h
        .auth
        .verify("node-1", &creds.cert_bytes, Some(&sig), None)
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidRequest(_)));
}

// ===== TEST GROUP 3: Revocation =====

#[test]
fn test_revoke_all_node_certificates() {
    let h = harness();
    let a = h.auth.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    let b = h.auth.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Secp256k1).unwrap();
    let other = h.auth.issue("node-2", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();

    assert_eq!(h.auth.revoke("node-1").unwrap(), 2);

    for creds in [&a, &b] {
        assert!(matches!(
            h.auth.verify("node-1", &creds.cert_bytes, None, None),
            Err(AuthError::Revoked { .. })
        ));
    }
    assert!(h.auth.verify("node-2", &other.cert_bytes, None, None).is_ok());

    // History is retained.
    let records = h.auth.certificates_for("node-1");
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.revoked && r.revoked_at == Some(T0)));
}

#[test]
fn test_revoke_twice_counts_zero() {
    let h = harness();
    h.auth.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    assert_eq!(h.auth.revoke("node-1").unwrap(), 1);
    assert_eq!(h.auth.revoke("node-1").unwrap(), 0);
}

#[test]
fn test_revoke_unknown_node() {
    let h = harness();
    assert_eq!(
        h.auth.revoke("ghost"),
        Err(AuthError::UnknownNode("ghost".into()))
    );
}

// ===== TEST GROUP 4: Challenge-response =====

#[test]
fn test_challenge_round_trip() {
    let h = harness();
    let creds = h.auth.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();

    let challenge = h.auth.create_challenge("node-1");
    assert_eq!(challenge.challenge.len(), 32);
    assert_eq!(challenge.expires_at, T0 + 10 * SECOND_MS);
    assert_eq!(h.auth.pending_challenges(), 1);

    let sig = creds.sign(&challenge.challenge);
    let result = h
        .auth
        .verify_challenge_response(&challenge.challenge_id, &sig, &creds.cert_bytes)
        .unwrap();
    assert!(result.proof_of_possession);

    // Single use.
    assert_eq!(h.auth.pending_challenges(), 0);
    assert!(matches!(
        h.auth.verify_challenge_response(&challenge.challenge_id, &sig, &creds.cert_bytes),
        Err(AuthError::ChallengeNotFound(_))
    ));
}

#[test]
fn test_challenge_attempts_exhausted() {
    let h = harness();
    let creds = h.auth.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    let challenge = h.auth.create_challenge("node-1");
    let bad = creds.sign(b"something else");

    for remaining in (0..3).rev() {
        assert_eq!(
            h.auth
                .verify_challenge_response(&challenge.challenge_id, &bad, &creds.cert_bytes),
            Err(AuthError::SignatureMismatch)
        );
        // The third miss invalidates the challenge on the spot.
        assert_eq!(h.auth.pending_challenges(), usize::from(remaining > 0));
    }

    // Even a correct answer is refused once the budget is spent.
    let good = creds.sign(&challenge.challenge);
    assert!(matches!(
        h.auth
            .verify_challenge_response(&challenge.challenge_id, &good, &creds.cert_bytes),
        Err(AuthError::ChallengeNotFound(_))
    ));
}

#[test]
fn test_challenge_for_other_node_fails() {
    let h = harness();
    let intruder = h.auth.issue("node-2", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    let challenge = h.auth.create_challenge("node-1");

    let sig = intruder.sign(&challenge.challenge);
    assert!(matches!(
        h.auth
            .verify_challenge_response(&challenge.challenge_id, &sig, &intruder.cert_bytes),
        Err(AuthError::NodeMismatch { .. })
    ));
}

#[test]
fn test_challenge_expires() {
    let h = harness();
    let creds = h.auth.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    let challenge = h.auth.create_challenge("node-1");

    h.clock.advance(10 * SECOND_MS);
    let sig = creds.sign(&challenge.challenge);
    assert_eq!(
        h.auth
            .verify_challenge_response(&challenge.challenge_id, &sig, &creds.cert_bytes),
        Err(AuthError::ChallengeExpired)
    );
    assert_eq!(h.auth.pending_challenges(), 0);
}

#[test]
fn test_cleanup_expired_challenges() {
    let h = harness();
    h.auth.create_challenge("a");
    h.clock.advance(5 * SECOND_MS);
    h.auth.create_challenge("b");
    h.clock.advance(5 * SECOND_MS);

    assert_eq!(h.auth.cleanup_expired_challenges(), 1);
    assert_eq!(h.auth.pending_challenges(), 1);
    assert_eq!(h.auth.cleanup_expired_challenges(), 0);
}

// ===== TEST GROUP 5: Persistence =====

#[test]
fn test_registry_survives_restart() {
    let h = harness();
    let secret = [5u8; 32];
    let ca = || CertificateAuthority::from_secret("model-mesh-ca", &secret, T0, DAY_MS).unwrap();

    let first = AuthenticationManager::with_authority(
        AuthConfig::for_testing(),
        ca(),
        h.store.clone(),
        h.clock.clone(),
    );
    let keep = first.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    let gone = first.issue("node-2", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    first.revoke("node-2").unwrap();

    let second = AuthenticationManager::with_authority(
        AuthConfig::for_testing(),
        ca(),
        h.store.clone(),
        h.clock.clone(),
    );
    assert_eq!(second.load().unwrap(), 2);
    assert!(second.verify("node-1", &keep.cert_bytes, None, None).is_ok());
    assert!(matches!(
        second.verify("node-2", &gone.cert_bytes, None, None),
        Err(AuthError::Revoked { .. })
    ));
}

#[test]
fn test_stored_records_hold_public_data_only() {
    let h = harness();
    let creds = h.auth.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();

    let stored = h
        .store
        .get(CERTIFICATES_COLLECTION, creds.certificate.serial())
        .unwrap()
        .unwrap();
    let obj = stored.as_object().unwrap();
    assert_eq!(
        obj.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["certificate", "issued_at", "revoked", "revoked_at"]
    );
    assert_eq!(h.store.len(CERTIFICATES_COLLECTION), 1);
    let json = serde_json::to_string(&stored).unwrap();
    assert!(!json.contains("secret"));
}

// ===== TEST GROUP 6: Events =====

#[test]
fn test_events_for_issue_reject_and_revoke() {
    let bus = Arc::new(InMemoryEventBus::new());
    let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Authentication]));
    let h = harness();
    let auth = h.auth.with_event_publisher(bus.clone());

    let creds = auth.issue("node-1", NodeRole::Worker, None, SigningAlgorithm::Ed25519).unwrap();
    let _ = auth.verify("node-x", &creds.cert_bytes, None, None);
    auth.revoke("node-1").unwrap();

    assert!(matches!(
        sub.try_recv().unwrap(),
        Some(ControlPlaneEvent::CertificateIssued { role: NodeRole::Worker, .. })
    ));
    match sub.try_recv().unwrap() {
        Some(ControlPlaneEvent::IdentityRejected { node_id, reason }) => {
            assert_eq!(node_id, "node-x");
            assert_eq!(reason, "auth_node_mismatch");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(
        sub.try_recv().unwrap(),
        Some(ControlPlaneEvent::CertificateRevoked { certificates: 1, .. })
    ));
}

#[test]
fn test_trait_object_dispatch() {
    let h = harness();
    let api: &dyn AuthenticationApi = &h.auth;
    let creds = api.issue("n", NodeRole::Admin, None, SigningAlgorithm::Ed25519).unwrap();
    assert_eq!(api.verify("n", &creds.cert_bytes, None, None).unwrap().role, NodeRole::Admin);
}
