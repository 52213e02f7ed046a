//! # Admission Service
//!
//! Pending requests live in a write-through cache over the `join_requests`
//! collection. Every mutation persists the updated record first and swaps it
//! into the cache only when the write succeeded.
//!
//! ## Decide
//!
//! ```text
//! lock: checks + mark deciding ─→ unlock ─→ reserve (async) ─→ lock: commit
//!                                                 │
//!                                   failure: stays PENDING, deciding cleared
//! ```

use crate::domain::{
    pending_listing, AdmissionConfig, AdmissionError, AdmissionStats, ApprovalDecision,
    JoinPriority, JoinRequest, NetworkPolicy, Permissions, RequestStatus, SubmitJoinRequest,
    SweepReport,
};
use crate::ports::{AdmissionApi, IdentityVerifier, ResourceReserver};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::RngCore;
use shared_bus::{CallbackRegistry, CallbackResult, ControlPlaneEvent, EventPublisher};
use shared_types::storage::{load_all, save_record};
use shared_types::{
    hash_license_key, redact, AdminId, KeyValueStore, KeyedRateLimiter, LicenseValidator,
    TimeSource,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SUBSYSTEM: &str = "admission";

/// Store collection holding one record per join request.
pub const JOIN_REQUESTS_COLLECTION: &str = "join_requests";

#[derive(Default)]
struct AdmissionState {
    policies: HashMap<String, NetworkPolicy>,
    global_admins: HashSet<AdminId>,
    requests: HashMap<String, JoinRequest>,
    /// Requests with a decision between its two lock phases.
    deciding: HashSet<String>,
    next_sequence: u64,
}

impl AdmissionState {
    fn check_room(
        &self,
        requester_id: &str,
        network_id: &str,
        max_pending: usize,
    ) -> Result<(), AdmissionError> {
        let mut pending = 0;
        for request in self.requests.values().filter(|r| r.is_pending()) {
            if request.requester_id == requester_id && request.network_id == network_id {
                return Err(AdmissionError::DuplicateRequest {
                    request_id: request.request_id.clone(),
                });
            }
            pending += 1;
        }
        if pending >= max_pending {
            return Err(AdmissionError::QueueFull {
                capacity: max_pending,
            });
        }
        Ok(())
    }

    fn has_authority(&self, admin_id: &str, policy: &NetworkPolicy) -> bool {
        policy.admins.contains(admin_id) || self.global_admins.contains(admin_id)
    }
}

/// Clears a request's deciding mark when dropped.
struct DecidingGuard<'a> {
    state: &'a Mutex<AdmissionState>,
    request_id: String,
}

impl Drop for DecidingGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().deciding.remove(&self.request_id);
    }
}

/// Join-request workflow.
pub struct AdmissionController {
    config: AdmissionConfig,
    store: Arc<dyn KeyValueStore>,
    time: Arc<dyn TimeSource>,
    license: Arc<dyn LicenseValidator>,
    identity: Option<Arc<dyn IdentityVerifier>>,
    reserver: Option<Arc<dyn ResourceReserver>>,
    events: Option<Arc<dyn EventPublisher>>,
    callbacks: CallbackRegistry<JoinRequest>,
    limiter: KeyedRateLimiter,
    state: Mutex<AdmissionState>,
}

impl AdmissionController {
    pub fn new(
        config: AdmissionConfig,
        store: Arc<dyn KeyValueStore>,
        time: Arc<dyn TimeSource>,
        license: Arc<dyn LicenseValidator>,
    ) -> Self {
        let limiter = KeyedRateLimiter::new(
            config.rate_limit_burst,
            config.rate_limit_refill_ms,
            time.clone(),
        );
        Self {
            config,
            store,
            time,
            license,
            identity: None,
            reserver: None,
            events: None,
            callbacks: CallbackRegistry::new(SUBSYSTEM),
            limiter,
            state: Mutex::new(AdmissionState::default()),
        }
    }

    /// Check requester certificates with `verifier`.
    pub fn with_identity_verifier(mut self, verifier: Arc<dyn IdentityVerifier>) -> Self {
        self.identity = Some(verifier);
        self
    }

    /// Reserve resources through `reserver` on approval.
    pub fn with_reserver(mut self, reserver: Arc<dyn ResourceReserver>) -> Self {
        self.reserver = Some(reserver);
        self
    }

    pub fn with_event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Register a callback for every accepted request.
    pub fn on_request<F>(&self, label: impl Into<String>, callback: F)
    where
        F: Fn(&JoinRequest) -> CallbackResult + Send + Sync + 'static,
    {
        self.callbacks.register(label, callback);
    }

    /// Hydrate the cache from the store.
    pub fn load(&self) -> Result<usize, AdmissionError> {
        let records: Vec<JoinRequest> = load_all(self.store.as_ref(), JOIN_REQUESTS_COLLECTION)?;
        let loaded = records.len();
        let mut state = self.state.lock();
        for request in records {
            state.next_sequence = state.next_sequence.max(request.sequence + 1);
            state.requests.insert(request.request_id.clone(), request);
        }
        drop(state);
        info!(subsystem = SUBSYSTEM, requests = loaded, "Join requests loaded from store");
        Ok(loaded)
    }

    // =========================================================================
    // NETWORKS AND ADMINS
    // =========================================================================

    pub fn register_network(&self, policy: NetworkPolicy) -> Result<(), AdmissionError> {
        if policy.network_id.is_empty() {
            return Err(AdmissionError::InvalidRequest("network id is empty".into()));
        }
        let mut state = self.state.lock();
        if state.policies.contains_key(&policy.network_id) {
            return Err(AdmissionError::NetworkExists(policy.network_id));
        }
        info!(
            subsystem = SUBSYSTEM,
            network_id = %policy.network_id,
            required_tier = %policy.required_tier,
            admins = policy.admins.len(),
            "Network registered"
        );
        state.policies.insert(policy.network_id.clone(), policy);
        Ok(())
    }

    /// Grant `admin_id` authority over every network.
    pub fn add_global_admin(&self, admin_id: impl Into<AdminId>) {
        let admin_id = admin_id.into();
        debug!(subsystem = SUBSYSTEM, admin_id = %admin_id, "Global admin added");
        self.state.lock().global_admins.insert(admin_id);
    }

    pub fn policy(&self, network_id: &str) -> Option<NetworkPolicy> {
        self.state.lock().policies.get(network_id).cloned()
    }

    // =========================================================================
    // SUBMIT
    // =========================================================================

    /// Validate entitlement and identity, then queue the request.
    pub async fn submit(&self, submission: SubmitJoinRequest) -> Result<JoinRequest, AdmissionError> {
        let requester_id = submission.requester_id.clone();
        let network_id = submission.network_id.clone();
        match self.submit_inner(submission).await {
            Ok(request) => Ok(request),
            Err(e) => {
                warn!(
                    subsystem = SUBSYSTEM,
                    requester_id = %requester_id,
                    network_id = %network_id,
                    reason = e.reason_code(),
                    "Join request refused"
                );
                Err(e)
            }
        }
    }

    async fn submit_inner(&self, submission: SubmitJoinRequest) -> Result<JoinRequest, AdmissionError> {
        let ttl_ms = self.validate_submission(&submission)?;
        {
            let state = self.state.lock();
            if !state.policies.contains_key(&submission.network_id) {
                return Err(AdmissionError::UnknownNetwork(submission.network_id.clone()));
            }
            state.check_room(
                &submission.requester_id,
                &submission.network_id,
                self.config.max_pending,
            )?;
        }
        if !self.limiter.try_acquire(&submission.requester_id) {
            return Err(AdmissionError::RateLimited {
                requester_id: submission.requester_id.clone(),
            });
        }

        let license = self.license.validate(&submission.license_key).await?;
        let license_hash = hash_license_key(&submission.license_key);
        let now = self.time.now();
        if license.is_expired(now) {
            return Err(AdmissionError::LicenseExpired {
                expired_at: license.expires_at,
            });
        }
        let identity_verified = self.check_identity(&submission, &license_hash)?;

        let SubmitJoinRequest {
            requester_id,
            requester_address,
            network_id,
            requester_info,
            priority,
            ..
        } = submission;
        let mut request = JoinRequest {
            request_id: uuid::Uuid::new_v4().to_string(),
            requester_id,
            requester_address,
            network_id,
            requester_info,
            priority,
            license_tier: license.tier,
            license_hash,
            license_expires_at: license.expires_at,
            identity_verified,
            security_token: self.security_token(),
            status: RequestStatus::Pending,
            submitted_at: now,
            expires_at: now.saturating_add(ttl_ms),
            sequence: 0,
            resolved_at: None,
            decision: None,
            cancel_reason: None,
        };

        {
            let mut state = self.state.lock();
            // The license call suspended; re-check against current state.
            state.check_room(&request.requester_id, &request.network_id, self.config.max_pending)?;
            request.sequence = state.next_sequence;
            save_record(
                self.store.as_ref(),
                JOIN_REQUESTS_COLLECTION,
                &request.request_id,
                &request,
            )?;
            state.next_sequence += 1;
            state.requests.insert(request.request_id.clone(), request.clone());
        }

        info!(
            subsystem = SUBSYSTEM,
            request_id = %request.request_id,
            requester_id = %request.requester_id,
            network_id = %request.network_id,
            tier = %request.license_tier,
            license = %redact(&request.license_hash),
            identity_verified,
            "Join request queued"
        );
        self.publish(ControlPlaneEvent::JoinRequestSubmitted {
            request_id: request.request_id.clone(),
            requester_id: request.requester_id.clone(),
            network_id: request.network_id.clone(),
            tier: request.license_tier,
        });
        self.callbacks.fire(&request);
        Ok(request)
    }

    fn validate_submission(&self, submission: &SubmitJoinRequest) -> Result<u64, AdmissionError> {
        let required = [
            ("requester id", &submission.requester_id),
            ("requester address", &submission.requester_address),
            ("network id", &submission.network_id),
            ("license key", &submission.license_key),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.is_empty()) {
            return Err(AdmissionError::InvalidRequest(format!("{field} is empty")));
        }
        let ttl_ms = submission.ttl_ms.unwrap_or(self.config.default_ttl_ms);
        if ttl_ms == 0 || ttl_ms > self.config.max_ttl_ms {
            return Err(AdmissionError::InvalidRequest(format!(
                "ttl must be between 1 and {} ms",
                self.config.max_ttl_ms
            )));
        }
        Ok(ttl_ms)
    }

    /// True when a certificate was presented and verified.
    fn check_identity(
        &self,
        submission: &SubmitJoinRequest,
        license_hash: &str,
    ) -> Result<bool, AdmissionError> {
        let (Some(certificate), Some(verifier)) =
            (&submission.requester_info.certificate, &self.identity)
        else {
            return Ok(false);
        };
        let identity = verifier
            .verify_identity(&submission.requester_id, certificate)
            .map_err(AdmissionError::IdentityRejected)?;
        if let Some(bound) = identity.license_hash {
            if bound != license_hash {
                return Err(AdmissionError::IdentityRejected("license_mismatch".into()));
            }
        }
        Ok(true)
    }

    fn security_token(&self) -> String {
        let mut bytes = vec![0u8; self.config.security_token_bytes];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    // =========================================================================
    // DECIDE
    // =========================================================================

    /// Approve or reject a pending request.
    pub async fn decide(
        &self,
        request_id: &str,
        admin_id: &str,
        approve: bool,
        notes: &str,
    ) -> Result<ApprovalDecision, AdmissionError> {
        let result = self.decide_inner(request_id, admin_id, approve, notes).await;
        if let Err(e) = &result {
            warn!(
                subsystem = SUBSYSTEM,
                request_id = %request_id,
                admin_id = %admin_id,
                approve,
                reason = e.reason_code(),
                "Decision refused"
            );
        }
        result
    }

    async fn decide_inner(
        &self,
        request_id: &str,
        admin_id: &str,
        approve: bool,
        notes: &str,
    ) -> Result<ApprovalDecision, AdmissionError> {
        let now = self.time.now();
        let (request, _guard) = {
            let mut state = self.state.lock();
            let request = state
                .requests
                .get(request_id)
                .cloned()
                .ok_or_else(|| AdmissionError::RequestNotFound(request_id.to_string()))?;
            if !request.is_pending() {
                return Err(AdmissionError::NotPending {
                    request_id: request_id.to_string(),
                    status: request.status,
                });
            }
            if state.deciding.contains(request_id) {
                return Err(AdmissionError::DecisionInProgress(request_id.to_string()));
            }
            if request.is_expired(now) {
                return Err(AdmissionError::RequestExpired(request_id.to_string()));
            }
            let policy = state
                .policies
                .get(&request.network_id)
                .ok_or_else(|| AdmissionError::UnknownNetwork(request.network_id.clone()))?;
            if !state.has_authority(admin_id, policy) {
                return Err(AdmissionError::Unauthorized {
                    admin_id: admin_id.to_string(),
                    network_id: request.network_id.clone(),
                });
            }
            if approve {
                if !policy.can_admit(request.license_tier) {
                    return Err(AdmissionError::InsufficientTier {
                        required: policy.required_tier,
                        actual: request.license_tier,
                    });
                }
                if policy.require_verified_identity && !request.identity_verified {
                    return Err(AdmissionError::IdentityRequired {
                        network_id: request.network_id.clone(),
                    });
                }
            }
            state.deciding.insert(request_id.to_string());
            let guard = DecidingGuard {
                state: &self.state,
                request_id: request_id.to_string(),
            };
            (request, guard)
        };

        let permissions = approve.then(|| Permissions::for_tier(request.license_tier));
        let allocation_id = match (&permissions, &self.reserver) {
            (Some(permissions), Some(reserver)) => Some(
                reserver
                    .reserve(&request, permissions)
                    .await
                    .map_err(|reason| AdmissionError::ReservationFailed { reason })?,
            ),
            _ => None,
        };

        let decided_at = self.time.now();
        let decision = ApprovalDecision {
            request_id: request_id.to_string(),
            admin_id: admin_id.to_string(),
            approved: approve,
            notes: notes.to_string(),
            decided_at,
            permissions,
            allocation_id,
        };
        let mut updated = request;
        updated.resolve(
            if approve {
                RequestStatus::Approved
            } else {
                RequestStatus::Rejected
            },
            decided_at,
        );
        updated.decision = Some(decision.clone());

        let committed = {
            let mut state = self.state.lock();
            save_record(
                self.store.as_ref(),
                JOIN_REQUESTS_COLLECTION,
                request_id,
                &updated,
            )
            .map(|()| {
                state.requests.insert(request_id.to_string(), updated.clone());
            })
        };
        if let Err(e) = committed {
            if let (Some(allocation_id), Some(reserver)) = (&decision.allocation_id, &self.reserver) {
                if let Err(reason) = reserver.release(allocation_id).await {
                    warn!(
                        subsystem = SUBSYSTEM,
                        request_id = %request_id,
                        allocation_id = %allocation_id,
                        %reason,
                        "Reservation leaked after failed commit"
                    );
                }
            }
            return Err(e.into());
        }

        info!(
            subsystem = SUBSYSTEM,
            request_id = %request_id,
            network_id = %updated.network_id,
            admin_id = %admin_id,
            approved = approve,
            allocation_id = decision.allocation_id.as_deref().unwrap_or("-"),
            "Join request decided"
        );
        self.publish(ControlPlaneEvent::JoinRequestDecided {
            request_id: request_id.to_string(),
            network_id: updated.network_id.clone(),
            admin_id: admin_id.to_string(),
            approved: approve,
        });
        Ok(decision)
    }

    // =========================================================================
    // CANCEL AND SWEEP
    // =========================================================================

    /// Withdraw a pending request.
    pub fn cancel(&self, request_id: &str, reason: &str) -> Result<JoinRequest, AdmissionError> {
        let now = self.time.now();
        let mut state = self.state.lock();
        let request = state
            .requests
            .get(request_id)
            .ok_or_else(|| AdmissionError::RequestNotFound(request_id.to_string()))?;
        if !request.is_pending() {
            return Err(AdmissionError::NotPending {
                request_id: request_id.to_string(),
                status: request.status,
            });
        }
        if state.deciding.contains(request_id) {
            return Err(AdmissionError::DecisionInProgress(request_id.to_string()));
        }

        let mut updated = request.clone();
        updated.resolve(RequestStatus::Cancelled, now);
        updated.cancel_reason = Some(reason.to_string());
        save_record(
            self.store.as_ref(),
            JOIN_REQUESTS_COLLECTION,
            request_id,
            &updated,
        )?;
        state.requests.insert(request_id.to_string(), updated.clone());
        drop(state);

        info!(subsystem = SUBSYSTEM, request_id = %request_id, reason = %reason, "Join request cancelled");
        Ok(updated)
    }

    /// Expire overdue pending requests and purge old terminal ones.
    pub fn sweep(&self) -> Result<SweepReport, AdmissionError> {
        let now = self.time.now();
        let retention = self.config.retention_ms;
        let mut report = SweepReport::default();
        let mut expired = Vec::new();
        {
            let mut state = self.state.lock();
            let overdue: Vec<String> = state
                .requests
                .values()
                .filter(|r| r.is_pending() && r.is_expired(now) && !state.deciding.contains(&r.request_id))
                .map(|r| r.request_id.clone())
                .collect();
            for request_id in overdue {
                let Some(request) = state.requests.get(&request_id) else {
                    continue;
                };
                let mut updated = request.clone();
                updated.resolve(RequestStatus::Expired, now);
                save_record(
                    self.store.as_ref(),
                    JOIN_REQUESTS_COLLECTION,
                    &request_id,
                    &updated,
                )?;
                expired.push((request_id.clone(), updated.network_id.clone()));
                state.requests.insert(request_id, updated);
                report.expired += 1;
            }

            let stale: Vec<String> = state
                .requests
                .values()
                .filter(|r| r.resolved_at.is_some_and(|t| now.saturating_sub(t) >= retention))
                .map(|r| r.request_id.clone())
                .collect();
            for request_id in stale {
                self.store.delete(JOIN_REQUESTS_COLLECTION, &request_id)?;
                state.requests.remove(&request_id);
                report.purged += 1;
            }
        }
        let pruned = self.limiter.prune();

        for (request_id, network_id) in expired {
            self.publish(ControlPlaneEvent::JoinRequestExpired {
                request_id,
                network_id,
            });
        }
        if report != SweepReport::default() {
            info!(
                subsystem = SUBSYSTEM,
                expired = report.expired,
                purged = report.purged,
                rate_buckets_pruned = pruned,
                "Admission sweep"
            );
        }
        Ok(report)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Pending requests, highest priority first, then oldest first.
    pub fn list(&self, network: Option<&str>, priority: Option<JoinPriority>) -> Vec<JoinRequest> {
        pending_listing(self.state.lock().requests.values(), network, priority)
    }

    pub fn get(&self, request_id: &str) -> Option<JoinRequest> {
        self.state.lock().requests.get(request_id).cloned()
    }

    pub fn stats(&self) -> AdmissionStats {
        let state = self.state.lock();
        let mut stats = AdmissionStats::default();
        for request in state.requests.values() {
            stats.count(request.status);
        }
        stats
    }

    fn publish(&self, event: ControlPlaneEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

#[async_trait]
impl AdmissionApi for AdmissionController {
    async fn submit(&self, submission: SubmitJoinRequest) -> Result<JoinRequest, AdmissionError> {
        AdmissionController::submit(self, submission).await
    }

    async fn decide(
        &self,
        request_id: &str,
        admin_id: &str,
        approve: bool,
        notes: &str,
    ) -> Result<ApprovalDecision, AdmissionError> {
        AdmissionController::decide(self, request_id, admin_id, approve, notes).await
    }

    fn list(&self, network: Option<&str>, priority: Option<JoinPriority>) -> Vec<JoinRequest> {
        AdmissionController::list(self, network, priority)
    }

    fn cancel(&self, request_id: &str, reason: &str) -> Result<JoinRequest, AdmissionError> {
        AdmissionController::cancel(self, request_id, reason)
    }

    fn get(&self, request_id: &str) -> Option<JoinRequest> {
        AdmissionController::get(self, request_id)
    }
}

#[cfg(test)]
mod tests;
