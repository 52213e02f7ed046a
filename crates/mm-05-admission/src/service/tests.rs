use super::*;
use crate::domain::RequesterInfo;
use crate::ports::VerifiedIdentity;
use shared_bus::{EventFilter, EventTopic, InMemoryEventBus};
use shared_types::{
    ErrorCategory, InMemoryStore, KeyValueStore, LicenseError, LicenseInfo, LicenseTier,
    MockTimeSource, NodeRole, StorageError, DAY_MS, MINUTE_MS, SECOND_MS,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

const T0: u64 = 1_700_000_000_000;

/// Keys of the form `<TIER>-...`; `EXPIRED-...` is a lapsed PRO license.
struct StubLicenses;

#[async_trait]
impl LicenseValidator for StubLicenses {
    async fn validate(&self, license_key: &str) -> Result<LicenseInfo, LicenseError> {
        let (tier, expires_at) = match license_key.split('-').next() {
            Some("FREE") => (LicenseTier::Free, T0 + 30 * DAY_MS),
            Some("PRO") => (LicenseTier::Pro, T0 + 30 * DAY_MS),
            Some("ENT") => (LicenseTier::Enterprise, T0 + 30 * DAY_MS),
            Some("EXPIRED") => (LicenseTier::Pro, T0 - DAY_MS),
            _ => return Err(LicenseError::Invalid),
        };
        Ok(LicenseInfo {
            tier,
            expires_at,
            max_clients: 10,
            allowed_models: vec![],
            license_hash: hash_license_key(license_key),
        })
    }
}

/// Accepts certificates spelled `good` or `bound:<license hash>`.
struct StubIdentity;

impl IdentityVerifier for StubIdentity {
    fn verify_identity(&self, _node_id: &str, certificate: &[u8]) -> Result<VerifiedIdentity, String> {
        let text = String::from_utf8_lossy(certificate);
        if text == "good" {
            return Ok(VerifiedIdentity {
                role: NodeRole::Worker,
                license_hash: None,
            });
        }
        match text.strip_prefix("bound:") {
            Some(hash) => Ok(VerifiedIdentity {
                role: NodeRole::Worker,
                license_hash: Some(hash.to_string()),
            }),
            None => Err("auth_untrusted_issuer".into()),
        }
    }
}

#[derive(Default)]
struct CountingReserver {
    calls: AtomicUsize,
    refuse: AtomicBool,
    released: parking_lot::Mutex<Vec<String>>,
    /// Set once a reservation is granted.
    granted: Option<Arc<AtomicBool>>,
}

#[async_trait]
impl ResourceReserver for CountingReserver {
    async fn reserve(&self, request: &JoinRequest, _permissions: &Permissions) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        if self.refuse.load(Ordering::SeqCst) {
            Err("alloc_tier_limit".into())
        } else {
            if let Some(granted) = &self.granted {
                granted.store(true, Ordering::SeqCst);
            }
            Ok(format!("alloc-{}", request.requester_id))
        }
    }

    async fn release(&self, allocation_id: &str) -> Result<(), String> {
        self.released.lock().push(allocation_id.to_string());
        Ok(())
    }
}

/// Refuses join-request writes once `armed` is set.
struct CommitFailingStore {
    inner: InMemoryStore,
    armed: Arc<AtomicBool>,
}

impl KeyValueStore for CommitFailingStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        self.inner.get(collection, key)
    }
    fn put(&self, collection: &str, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        if collection == JOIN_REQUESTS_COLLECTION && self.armed.load(Ordering::SeqCst) {
            return Err(StorageError::Io {
                message: "disk full".into(),
            });
        }
        self.inner.put(collection, key, value)
    }
    fn list(&self, collection: &str) -> Result<Vec<(String, serde_json::Value)>, StorageError> {
        self.inner.list(collection)
    }
    fn delete(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        self.inner.delete(collection, key)
    }
}

struct Harness {
    admission: AdmissionController,
    store: Arc<InMemoryStore>,
    clock: Arc<MockTimeSource>,
    reserver: Arc<CountingReserver>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(MockTimeSource::new(T0));
    let reserver = Arc::new(CountingReserver::default());
    let admission = AdmissionController::new(
        AdmissionConfig::for_testing(),
        store.clone(),
        clock.clone(),
        Arc::new(StubLicenses),
    )
    .with_identity_verifier(Arc::new(StubIdentity))
    .with_reserver(reserver.clone());
    admission
        .register_network(NetworkPolicy::new("open-net", LicenseTier::Free).with_admin("alice"))
        .unwrap();
    admission
        .register_network(NetworkPolicy::new("ent-net", LicenseTier::Enterprise).with_admin("alice"))
        .unwrap();
    Harness {
        admission,
        store,
        clock,
        reserver,
    }
}

fn submission(requester: &str, network: &str, license_key: &str) -> SubmitJoinRequest {
    SubmitJoinRequest {
        requester_id: requester.into(),
        requester_address: "10.0.0.7:7000".into(),
        network_id: network.into(),
        license_key: license_key.into(),
        requester_info: RequesterInfo {
            role: Some(NodeRole::Worker),
            hostname: format!("{requester}.local"),
            gpu_memory_mb: 24_576,
            ..RequesterInfo::default()
        },
        priority: JoinPriority::Normal,
        ttl_ms: None,
    }
}

fn with_certificate(mut submission: SubmitJoinRequest, certificate: &str) -> SubmitJoinRequest {
    submission.requester_info.certificate = Some(certificate.as_bytes().to_vec());
    submission
}

// ===== TEST GROUP 1: Submission =====

#[tokio::test]
async fn test_submit_queues_and_persists() {
    let h = harness();
    let bus = Arc::new(InMemoryEventBus::new());
    let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Admission]));
    let admission = h.admission.with_event_publisher(bus.clone());
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    admission.on_request("count", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let request = admission
        .submit(submission("node-1", "open-net", "PRO-123"))
        .await
        .unwrap();

    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.license_tier, LicenseTier::Pro);
    assert_eq!(request.license_hash, hash_license_key("PRO-123"));
    assert_eq!(request.security_token.len(), 64);
    assert!(request.security_token.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(request.expires_at, T0 + 10 * MINUTE_MS);
    assert!(!request.identity_verified);

    assert_eq!(h.store.len(JOIN_REQUESTS_COLLECTION), 1);
    let stored = h.store.get(JOIN_REQUESTS_COLLECTION, &request.request_id).unwrap().unwrap();
    assert!(!stored.to_string().contains("PRO-123"));

    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert!(matches!(
        sub.try_recv(),
        Ok(Some(ControlPlaneEvent::JoinRequestSubmitted { tier: LicenseTier::Pro, .. }))
    ));
}

#[tokio::test]
async fn test_submit_validation_failures() {
    let h = harness();
    assert_eq!(
        h.admission.submit(submission("node-1", "nowhere", "PRO-1")).await,
        Err(AdmissionError::UnknownNetwork("nowhere".into()))
    );
    assert!(matches!(
        h.admission.submit(submission("", "open-net", "PRO-1")).await,
        Err(AdmissionError::InvalidRequest(_))
    ));
    let mut long_ttl = submission("node-1", "open-net", "PRO-1");
    long_ttl.ttl_ms = Some(2 * DAY_MS);
    assert!(matches!(
        h.admission.submit(long_ttl).await,
        Err(AdmissionError::InvalidRequest(_))
    ));
    assert_eq!(h.admission.stats(), AdmissionStats::default());
}

#[tokio::test]
async fn test_submit_entitlement_failures() {
    let h = harness();
    let err = h
        .admission
        .submit(submission("node-1", "open-net", "bogus"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Entitlement);
    assert_eq!(err.reason_code(), "license_invalid");

    assert_eq!(
        h.admission
            .submit(submission("node-2", "open-net", "EXPIRED-1"))
            .await,
        Err(AdmissionError::LicenseExpired {
            expired_at: T0 - DAY_MS
        })
    );
}

#[tokio::test]
async fn test_queue_bound_and_duplicates() {
    let h = harness();
    h.admission
        .submit(submission("node-0", "open-net", "FREE-0"))
        .await
        .unwrap();
    assert!(matches!(
        h.admission.submit(submission("node-0", "open-net", "FREE-0")).await,
        Err(AdmissionError::DuplicateRequest { .. })
    ));

    for i in 1..4 {
        h.admission
            .submit(submission(&format!("node-{i}"), "open-net", "FREE-0"))
            .await
            .unwrap();
    }
    let err = h
        .admission
        .submit(submission("node-9", "open-net", "FREE-0"))
        .await
        .unwrap_err();
    assert_eq!(err, AdmissionError::QueueFull { capacity: 4 });
    assert_eq!(err.category(), ErrorCategory::Capacity);
}

#[tokio::test]
async fn test_rate_limit_per_requester() {
    let h = harness();
    for _ in 0..5 {
        let request = h
            .admission
            .submit(submission("node-1", "open-net", "PRO-1"))
            .await
            .unwrap();
        h.admission.cancel(&request.request_id, "retry").unwrap();
    }
    assert_eq!(
        h.admission
            .submit(submission("node-1", "open-net", "PRO-1"))
            .await,
        Err(AdmissionError::RateLimited {
            requester_id: "node-1".into()
        })
    );
    // Other requesters are unaffected.
    h.admission
        .submit(submission("node-2", "open-net", "PRO-1"))
        .await
        .unwrap();

    h.clock.advance(12 * SECOND_MS);
    h.admission
        .submit(submission("node-1", "open-net", "PRO-1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_identity_checks_at_submission() {
    let h = harness();
    let verified = h
        .admission
        .submit(with_certificate(submission("node-1", "open-net", "PRO-1"), "good"))
        .await
        .unwrap();
    assert!(verified.identity_verified);

    let err = h
        .admission
        .submit(with_certificate(submission("node-2", "open-net", "PRO-1"), "forged"))
        .await
        .unwrap_err();
    assert_eq!(err, AdmissionError::IdentityRejected("auth_untrusted_issuer".into()));
    assert_eq!(err.category(), ErrorCategory::Identity);

    let bound = format!("bound:{}", hash_license_key("PRO-other"));
    assert_eq!(
        h.admission
            .submit(with_certificate(submission("node-3", "open-net", "PRO-1"), &bound))
            .await,
        Err(AdmissionError::IdentityRejected("license_mismatch".into()))
    );
}

// ===== TEST GROUP 2: Decisions =====

#[tokio::test(start_paused = true)]
async fn test_approve_reserves_and_grants_permissions() {
    let h = harness();
    let request = h
        .admission
        .submit(submission("node-1", "open-net", "PRO-1"))
        .await
        .unwrap();

    let decision = h
        .admission
        .decide(&request.request_id, "alice", true, "welcome")
        .await
        .unwrap();
    assert!(decision.approved);
    assert_eq!(decision.permissions, Some(Permissions::for_tier(LicenseTier::Pro)));
    assert_eq!(decision.allocation_id.as_deref(), Some("alloc-node-1"));
    assert_eq!(h.reserver.calls.load(Ordering::SeqCst), 1);

    let stored = h.admission.get(&request.request_id).unwrap();
    assert_eq!(stored.status, RequestStatus::Approved);
    assert_eq!(stored.decision, Some(decision));
    assert!(h.admission.list(None, None).is_empty());

    assert!(matches!(
        h.admission.decide(&request.request_id, "alice", false, "").await,
        Err(AdmissionError::NotPending {
            status: RequestStatus::Approved,
            ..
        })
    ));
}

#[tokio::test]
async fn test_pro_request_on_enterprise_network_is_refused() {
    let h = harness();
    let request = h
        .admission
        .submit(submission("node-1", "ent-net", "PRO-1"))
        .await
        .unwrap();

    let err = h
        .admission
        .decide(&request.request_id, "alice", true, "")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AdmissionError::InsufficientTier {
            required: LicenseTier::Enterprise,
            actual: LicenseTier::Pro
        }
    );
    assert_eq!(err.category(), ErrorCategory::Entitlement);
    assert_eq!(h.reserver.calls.load(Ordering::SeqCst), 0);
    assert!(h.admission.get(&request.request_id).unwrap().is_pending());

    let decision = h
        .admission
        .decide(&request.request_id, "alice", false, "tier too low")
        .await
        .unwrap();
    assert!(!decision.approved);
    assert_eq!(decision.permissions, None);
    assert_eq!(h.reserver.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_admin_authority() {
    let h = harness();
    let request = h
        .admission
        .submit(submission("node-1", "open-net", "FREE-1"))
        .await
        .unwrap();
    assert!(matches!(
        h.admission.decide(&request.request_id, "mallory", false, "").await,
        Err(AdmissionError::Unauthorized { .. })
    ));

    h.admission.add_global_admin("root");
    h.admission
        .decide(&request.request_id, "root", false, "")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_decide_rejects_expired_and_unverified() {
    let h = harness();
    h.admission
        .register_network(
            NetworkPolicy::new("strict-net", LicenseTier::Free)
                .with_admin("alice")
                .with_verified_identity(),
        )
        .unwrap();

    let unverified = h
        .admission
        .submit(submission("node-1", "strict-net", "FREE-1"))
        .await
        .unwrap();
    assert_eq!(
        h.admission
            .decide(&unverified.request_id, "alice", true, "")
            .await,
        Err(AdmissionError::IdentityRequired {
            network_id: "strict-net".into()
        })
    );

    h.clock.advance(10 * MINUTE_MS);
    assert_eq!(
        h.admission
            .decide(&unverified.request_id, "alice", false, "")
            .await,
        Err(AdmissionError::RequestExpired(unverified.request_id.clone()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_reservation_failure_leaves_request_pending() {
    let h = harness();
    h.reserver.refuse.store(true, Ordering::SeqCst);
    let request = h
        .admission
        .submit(submission("node-1", "open-net", "FREE-1"))
        .await
        .unwrap();

    let err = h
        .admission
        .decide(&request.request_id, "alice", true, "")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AdmissionError::ReservationFailed {
            reason: "alloc_tier_limit".into()
        }
    );
    assert!(h.admission.get(&request.request_id).unwrap().is_pending());

    // The deciding mark was cleared.
    h.reserver.refuse.store(false, Ordering::SeqCst);
    assert!(h
        .admission
        .decide(&request.request_id, "alice", true, "")
        .await
        .is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_failed_commit_releases_reservation() {
    let armed = Arc::new(AtomicBool::new(false));
    let reserver = Arc::new(CountingReserver {
        granted: Some(armed.clone()),
        ..CountingReserver::default()
    });
    let admission = AdmissionController::new(
        AdmissionConfig::for_testing(),
        Arc::new(CommitFailingStore {
            inner: InMemoryStore::new(),
            armed: armed.clone(),
        }),
        Arc::new(MockTimeSource::new(T0)),
        Arc::new(StubLicenses),
    )
    .with_reserver(reserver.clone());
    admission
        .register_network(NetworkPolicy::new("open-net", LicenseTier::Free).with_admin("alice"))
        .unwrap();
    let request = admission
        .submit(submission("node-1", "open-net", "PRO-1"))
        .await
        .unwrap();

    let err = admission
        .decide(&request.request_id, "alice", true, "")
        .await
        .unwrap_err();
    assert!(matches!(err, AdmissionError::Storage(_)));
    assert_eq!(*reserver.released.lock(), vec!["alloc-node-1".to_string()]);
    assert!(admission.get(&request.request_id).unwrap().is_pending());

    // Once the store recovers, a retry reserves afresh and commits.
    armed.store(false, Ordering::SeqCst);
    let reserver_calls = reserver.calls.load(Ordering::SeqCst);
    admission
        .decide(&request.request_id, "alice", true, "")
        .await
        .unwrap();
    assert_eq!(reserver.calls.load(Ordering::SeqCst), reserver_calls + 1);
    assert_eq!(reserver.released.lock().len(), 1);
    assert_eq!(
        admission.get(&request.request_id).unwrap().status,
        RequestStatus::Approved
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_decide_sees_in_progress() {
    let h = harness();
    let request = h
        .admission
        .submit(submission("node-1", "open-net", "PRO-1"))
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        h.admission.decide(&request.request_id, "alice", true, ""),
        h.admission.decide(&request.request_id, "alice", false, ""),
    );
    assert!(first.unwrap().approved);
    assert_eq!(
        second,
        Err(AdmissionError::DecisionInProgress(request.request_id.clone()))
    );
    assert_eq!(h.reserver.calls.load(Ordering::SeqCst), 1);
}

// ===== TEST GROUP 3: Listing, cancel and sweep =====

#[tokio::test]
async fn test_list_orders_by_priority_then_age() {
    let h = harness();
    for (node, priority) in [
        ("n-low", JoinPriority::Low),
        ("n-normal-1", JoinPriority::Normal),
        ("n-urgent", JoinPriority::Urgent),
        ("n-normal-2", JoinPriority::Normal),
    ] {
        let mut s = submission(node, "open-net", "FREE-1");
        s.priority = priority;
        h.admission.submit(s).await.unwrap();
        h.clock.advance(SECOND_MS);
    }

    let order: Vec<String> = h
        .admission
        .list(None, None)
        .into_iter()
        .map(|r| r.requester_id)
        .collect();
    assert_eq!(order, vec!["n-urgent", "n-normal-1", "n-normal-2", "n-low"]);
    assert_eq!(h.admission.list(Some("open-net"), Some(JoinPriority::Normal)).len(), 2);
    assert!(h.admission.list(Some("ent-net"), None).is_empty());
}

#[tokio::test]
async fn test_cancel() {
    let h = harness();
    let request = h
        .admission
        .submit(submission("node-1", "open-net", "FREE-1"))
        .await
        .unwrap();
    let cancelled = h.admission.cancel(&request.request_id, "changed my mind").unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("changed my mind"));
    assert!(matches!(
        h.admission.cancel(&request.request_id, "again"),
        Err(AdmissionError::NotPending { .. })
    ));
    assert_eq!(h.admission.stats().cancelled, 1);
}

#[tokio::test]
async fn test_sweep_expires_then_purges() {
    let h = harness();
    let bus = Arc::new(InMemoryEventBus::new());
    let admission = h.admission.with_event_publisher(bus.clone());
    let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Admission]));

    let request = admission
        .submit(submission("node-1", "open-net", "FREE-1"))
        .await
        .unwrap();
    assert_eq!(admission.sweep().unwrap(), SweepReport::default());

    h.clock.advance(10 * MINUTE_MS);
    assert_eq!(
        admission.sweep().unwrap(),
        SweepReport {
            expired: 1,
            purged: 0
        }
    );
    assert_eq!(admission.get(&request.request_id).unwrap().status, RequestStatus::Expired);
    assert_eq!(admission.stats().expired, 1);
    assert!(matches!(
        sub.try_recv(),
        Ok(Some(ControlPlaneEvent::JoinRequestExpired { .. }))
    ));

    h.clock.advance(7 * DAY_MS);
    assert_eq!(admission.sweep().unwrap().purged, 1);
    assert!(admission.get(&request.request_id).is_none());
    assert_eq!(h.store.len(JOIN_REQUESTS_COLLECTION), 0);
}

// ===== TEST GROUP 4: Persistence and trait dispatch =====

#[tokio::test]
async fn test_load_restores_requests_and_sequence() {
    let h = harness();
    let first = h
        .admission
        .submit(submission("node-1", "open-net", "FREE-1"))
        .await
        .unwrap();

    let restarted = AdmissionController::new(
        AdmissionConfig::for_testing(),
        h.store.clone(),
        h.clock.clone(),
        Arc::new(StubLicenses),
    );
    restarted
        .register_network(NetworkPolicy::new("open-net", LicenseTier::Free))
        .unwrap();
    assert_eq!(restarted.load().unwrap(), 1);
    assert_eq!(restarted.get(&first.request_id), Some(first.clone()));

    let second = restarted
        .submit(submission("node-2", "open-net", "FREE-1"))
        .await
        .unwrap();
    assert!(second.sequence > first.sequence);
}

#[tokio::test]
async fn test_api_trait_dispatch() {
    let h = harness();
    let api: &dyn AdmissionApi = &h.admission;
    let request = api
        .submit(submission("node-1", "open-net", "ENT-1"))
        .await
        .unwrap();
    assert_eq!(api.list(None, None).len(), 1);
    assert!(api.get(&request.request_id).is_some());
    api.cancel(&request.request_id, "done").unwrap();
    assert!(api.list(None, None).is_empty());
}
