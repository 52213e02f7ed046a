//! # Key Manager Service
//!
//! Owns the key cache and keeps it consistent with the store.
//!
//! ## Write Ordering
//!
//! Every mutation builds the new record, persists it, and only then swaps it
//! into the cache. A failed write leaves the cache untouched.
//!
//! ## Rotation
//!
//! ```text
//! acquire guard ─→ snapshot old key ─→ derive successor (spawn_blocking)
//!                                          │
//!       release guard ←─ publish ←─ commit linkage under lock (re-checked)
//! ```

use crate::domain::derivation::{derive_storage_material, expand_transfer_material};
use crate::domain::{
    CleanupReport, KeyAlgorithm, KeyError, KeyManagerConfig, KeyMetadata, KeyPurpose, KeyRecord,
    KeyStatus, ManagedKey, RevocationEntry, RevocationList, RotateKeyRequest, RotationEvent,
};
use crate::ports::{
    HardwareFingerprintProvider, KeyManagementApi, KeyRotationNotifier, NoopRotationNotifier,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use parking_lot::Mutex;
use shared_bus::{ControlPlaneEvent, EventPublisher};
use shared_crypto::SecretKey;
use shared_types::storage::{load_all, load_record, save_record};
use shared_types::{hash_license_key, redact, KeyValueStore, TimeSource, Timestamp, DAY_MS};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SUBSYSTEM: &str = "key_management";

/// Store collection holding one record per key.
pub const KEYS_COLLECTION: &str = "managed_keys";
/// Store collection holding the rotation log.
pub const ROTATION_LOG_COLLECTION: &str = "rotation_log";
/// Store collection holding the revocation list.
pub const REVOCATIONS_COLLECTION: &str = "revocations";

const ROTATION_LOG_KEY: &str = "events";
const REVOCATION_LIST_KEY: &str = "revocation-list";

struct CachedKey {
    key: ManagedKey,
    material: Option<SecretKey>,
}

#[derive(Default)]
struct KeyState {
    keys: HashMap<String, CachedKey>,
    rotation_log: VecDeque<RotationEvent>,
    revocations: RevocationList,
}

impl KeyState {
    fn live_storage_key(&self, model_id: &str, fingerprint: &str, now: Timestamp) -> Option<&CachedKey> {
        self.keys
            .values()
            .filter(|c| {
                c.key.metadata.purpose == KeyPurpose::Storage
                    && c.key.model_id() == model_id
                    && c.key.status == KeyStatus::Active
                    && c.key.hardware_fingerprint == fingerprint
                    && !c.key.is_expired(now)
            })
            .max_by_key(|c| c.key.rotation_generation)
    }

    fn binding_valid(&self, key_id: &str, fingerprint: &str, now: Timestamp) -> bool {
        match self.keys.get(key_id) {
            Some(cached) => {
                !self.revocations.contains(key_id)
                    && cached.key.status.is_usable()
                    && cached.key.hardware_fingerprint == fingerprint
                    && !cached.key.is_expired(now)
                    && cached.material.is_some()
            }
            None => false,
        }
    }
}

/// Clears the in-flight flag when dropped.
struct RotationGuard<'a>(&'a AtomicBool);

impl<'a> RotationGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RotationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Hardware-bound key lifecycle manager.
pub struct KeyManager {
    config: KeyManagerConfig,
    store: Arc<dyn KeyValueStore>,
    time: Arc<dyn TimeSource>,
    fingerprint: String,
    notifier: Arc<dyn KeyRotationNotifier>,
    events: Option<Arc<dyn EventPublisher>>,
    state: Mutex<KeyState>,
    rotation_in_progress: AtomicBool,
}

impl KeyManager {
    /// Create a manager. The machine fingerprint is read once here.
    pub fn new(
        config: KeyManagerConfig,
        store: Arc<dyn KeyValueStore>,
        time: Arc<dyn TimeSource>,
        fingerprint: &dyn HardwareFingerprintProvider,
    ) -> Self {
        Self {
            config,
            store,
            time,
            fingerprint: fingerprint.fingerprint(),
            notifier: Arc::new(NoopRotationNotifier),
            events: None,
            state: Mutex::new(KeyState::default()),
            rotation_in_progress: AtomicBool::new(false),
        }
    }

    /// Deliver rotation notices through `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn KeyRotationNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Publish lifecycle events on `events`.
    pub fn with_event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Fingerprint of this machine.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Hydrate the cache from the store. Returns the number of keys cached.
    ///
    /// EXPIRED keys stay in the store only.
    pub fn load(&self) -> Result<usize, KeyError> {
        let records: Vec<KeyRecord> = load_all(self.store.as_ref(), KEYS_COLLECTION)?;
        let rotation_log: Vec<RotationEvent> =
            load_record(self.store.as_ref(), ROTATION_LOG_COLLECTION, ROTATION_LOG_KEY)?
                .unwrap_or_default();
        let revocations: RevocationList =
            load_record(self.store.as_ref(), REVOCATIONS_COLLECTION, REVOCATION_LIST_KEY)?
                .unwrap_or_default();

        let mut keys = HashMap::new();
        for record in records {
            if record.key.status == KeyStatus::Expired {
                continue;
            }
            let material = decode_material(&record)?;
            keys.insert(
                record.key.key_id.clone(),
                CachedKey {
                    key: record.key,
                    material,
                },
            );
        }

        let loaded = keys.len();
        let mut state = self.state.lock();
        state.keys = keys;
        state.rotation_log = rotation_log.into_iter().collect();
        state.revocations = revocations;
        drop(state);

        info!(subsystem = SUBSYSTEM, keys = loaded, "Key cache loaded from store");
        Ok(loaded)
    }

    /// Derive a new storage key bound to this machine.
    pub async fn derive_hardware_bound_key(
        &self,
        license_key: &str,
        model_id: &str,
        lifetime_days: Option<u32>,
    ) -> Result<ManagedKey, KeyError> {
        let days = lifetime_days.unwrap_or(self.config.default_lifetime_days);
        if days == 0 {
            return Err(KeyError::InvalidRequest("lifetime must be at least one day".into()));
        }
        self.derive(license_key, KeyMetadata::storage(model_id), u64::from(days) * DAY_MS)
            .await
    }

    /// Derive a session-scoped transfer key.
    pub async fn derive_transfer_key(
        &self,
        license_key: &str,
        model_id: &str,
        session_id: &str,
    ) -> Result<ManagedKey, KeyError> {
        if session_id.is_empty() {
            return Err(KeyError::InvalidRequest("session id is empty".into()));
        }
        self.derive(
            license_key,
            KeyMetadata::transfer(model_id, session_id),
            self.config.transfer_key_lifetime_ms,
        )
        .await
    }

    /// ACTIVE storage key for the model, deriving one if none exists.
    pub async fn get_or_derive(&self, license_key: &str, model_id: &str) -> Result<ManagedKey, KeyError> {
        let now = self.time.now();
        {
            let state = self.state.lock();
            if let Some(cached) = state.live_storage_key(model_id, &self.fingerprint, now) {
                if cached.key.license_key_hash != hash_license_key(license_key) {
                    return Err(KeyError::LicenseMismatch {
                        key_id: cached.key.key_id.clone(),
                    });
                }
                return Ok(cached.key.clone());
            }
        }
        self.derive_hardware_bound_key(license_key, model_id, None).await
    }

    async fn derive(
        &self,
        license_key: &str,
        metadata: KeyMetadata,
        lifetime_ms: u64,
    ) -> Result<ManagedKey, KeyError> {
        if license_key.is_empty() || metadata.model_id.is_empty() {
            return Err(KeyError::InvalidRequest("license key and model id are required".into()));
        }
        if metadata.purpose == KeyPurpose::Storage {
            self.ensure_no_live_storage_key(&metadata.model_id)?;
        }

        let key_id = uuid::Uuid::new_v4().to_string();
        let material = self
            .derive_material(license_key, &metadata, &key_id)
            .await?;

        let now = self.time.now();
        let key = ManagedKey {
            key_id: key_id.clone(),
            algorithm: KeyAlgorithm::Aes256Gcm,
            hardware_fingerprint: self.fingerprint.clone(),
            license_key_hash: hash_license_key(license_key),
            created_at: now,
            expires_at: now.saturating_add(lifetime_ms),
            status: KeyStatus::Active,
            rotation_generation: 1,
            predecessor_key_id: None,
            successor_key_id: None,
            metadata,
        };

        {
            let mut state = self.state.lock();
            // Another derivation may have finished while this one ran.
            if key.metadata.purpose == KeyPurpose::Storage {
                if let Some(existing) =
                    state.live_storage_key(key.model_id(), &self.fingerprint, now)
                {
                    return Err(KeyError::ActiveKeyExists {
                        model_id: key.model_id().to_string(),
                        key_id: existing.key.key_id.clone(),
                    });
                }
            }
            self.persist_key(&key, Some(&material))?;
            state.keys.insert(
                key_id.clone(),
                CachedKey {
                    key: key.clone(),
                    material: Some(material),
                },
            );
        }

        info!(
            subsystem = SUBSYSTEM,
            key_id = %key.key_id,
            model_id = %key.model_id(),
            purpose = ?key.metadata.purpose,
            license = %redact(&key.license_key_hash),
            "Derived hardware-bound key"
        );
        self.publish(ControlPlaneEvent::KeyDerived {
            key_id: key.key_id.clone(),
            model_id: key.model_id().to_string(),
        });
        Ok(key)
    }

    fn ensure_no_live_storage_key(&self, model_id: &str) -> Result<(), KeyError> {
        let now = self.time.now();
        let state = self.state.lock();
        match state.live_storage_key(model_id, &self.fingerprint, now) {
            Some(existing) => Err(KeyError::ActiveKeyExists {
                model_id: model_id.to_string(),
                key_id: existing.key.key_id.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn derive_material(
        &self,
        license_key: &str,
        metadata: &KeyMetadata,
        key_id: &str,
    ) -> Result<SecretKey, KeyError> {
        let license_key = license_key.to_string();
        let model_id = metadata.model_id.clone();
        let key_id = key_id.to_string();
        let fingerprint = self.fingerprint.clone();
        let iterations = self.config.pbkdf2_iterations;

        let base = tokio::task::spawn_blocking(move || {
            derive_storage_material(&license_key, &model_id, &key_id, &fingerprint, iterations)
        })
        .await
        .map_err(|e| KeyError::TaskFailed(e.to_string()))??;

        match (&metadata.purpose, &metadata.session_id) {
            (KeyPurpose::Transfer, Some(session_id)) => {
                Ok(expand_transfer_material(&base, session_id)?)
            }
            _ => Ok(base),
        }
    }

    /// True iff the key is cached, usable, unexpired, unrevoked and bound here.
    pub fn validate_binding(&self, key_id: &str) -> bool {
        let now = self.time.now();
        self.state.lock().binding_valid(key_id, &self.fingerprint, now)
    }

    /// Key material, only while [`Self::validate_binding`] holds.
    pub fn key_material(&self, key_id: &str) -> Result<SecretKey, KeyError> {
        let now = self.time.now();
        let state = self.state.lock();
        if !state.binding_valid(key_id, &self.fingerprint, now) {
            return Err(KeyError::BindingInvalid {
                key_id: key_id.to_string(),
            });
        }
        state
            .keys
            .get(key_id)
            .and_then(|c| c.material.clone())
            .ok_or_else(|| KeyError::BindingInvalid {
                key_id: key_id.to_string(),
            })
    }

    /// Count blocks encrypted under a key.
    pub fn record_usage(&self, key_id: &str, blocks: u64) -> Result<(), KeyError> {
        let mut state = self.state.lock();
        let cached = state
            .keys
            .get_mut(key_id)
            .ok_or_else(|| KeyError::KeyNotFound(key_id.to_string()))?;

        let mut updated = cached.key.clone();
        updated.metadata.encrypted_block_count =
            updated.metadata.encrypted_block_count.saturating_add(blocks);
        self.persist_key(&updated, cached.material.as_ref())?;
        cached.key = updated;
        Ok(())
    }

    /// Replace a key with a linked successor.
    pub async fn rotate(&self, request: RotateKeyRequest) -> Result<ManagedKey, KeyError> {
        let _guard = RotationGuard::acquire(&self.rotation_in_progress)
            .ok_or(KeyError::RotationInProgress)?;

        let old = {
            let state = self.state.lock();
            let cached = state
                .keys
                .get(&request.old_key_id)
                .ok_or_else(|| KeyError::KeyNotFound(request.old_key_id.clone()))?;
            check_rotatable(&cached.key)?;
            if cached.key.license_key_hash != hash_license_key(&request.license_key) {
                return Err(KeyError::LicenseMismatch {
                    key_id: cached.key.key_id.clone(),
                });
            }
            cached.key.clone()
        };

        let new_key_id = uuid::Uuid::new_v4().to_string();
        let material = self
            .derive_material(&request.license_key, &old.metadata, &new_key_id)
            .await?;

        let now = self.time.now();
        let lifetime = old.expires_at.saturating_sub(old.created_at);
        let mut metadata = old.metadata.clone();
        metadata.encrypted_block_count = 0;

        let successor = ManagedKey {
            key_id: new_key_id.clone(),
            algorithm: old.algorithm,
            hardware_fingerprint: self.fingerprint.clone(),
            license_key_hash: old.license_key_hash.clone(),
            created_at: now,
            expires_at: now.saturating_add(lifetime),
            status: KeyStatus::Active,
            rotation_generation: old.rotation_generation + 1,
            predecessor_key_id: Some(old.key_id.clone()),
            successor_key_id: None,
            metadata,
        };

        let event = {
            let mut state = self.state.lock();
            let (current, current_material) = match state.keys.get(&old.key_id) {
                Some(c) => (c.key.clone(), c.material.clone()),
                None => return Err(KeyError::KeyNotFound(old.key_id.clone())),
            };
            check_rotatable(&current)?;

            let mut retired = current.clone();
            retired.status = KeyStatus::Rotating;
            retired.successor_key_id = Some(new_key_id.clone());
            retired.expires_at = retired
                .expires_at
                .min(now.saturating_add(self.config.rotation_overlap_ms));

            let event = RotationEvent {
                event_id: uuid::Uuid::new_v4().to_string(),
                old_key_id: current.key_id.clone(),
                new_key_id: new_key_id.clone(),
                model_id: current.model_id().to_string(),
                rotated_at: now,
                rotated_by: request.rotated_by.clone(),
                affected_blocks: current.metadata.encrypted_block_count,
                notified_clients: request.notify_targets.clone(),
                generation: successor.rotation_generation,
            };
            let mut log = state.rotation_log.clone();
            log.push_back(event.clone());
            while log.len() > self.config.max_rotation_log {
                log.pop_front();
            }

            self.persist_key(&successor, Some(&material))?;
            if let Err(e) = self.persist_key(&retired, current_material.as_ref()) {
                self.discard_record(&successor.key_id);
                return Err(e);
            }
            if let Err(e) =
                save_record(self.store.as_ref(), ROTATION_LOG_COLLECTION, ROTATION_LOG_KEY, &log)
            {
                self.discard_record(&successor.key_id);
                if let Err(restore) = self.persist_key(&current, current_material.as_ref()) {
                    warn!(
                        subsystem = SUBSYSTEM,
                        key_id = %current.key_id,
                        error = %restore,
                        "Failed to restore predecessor after aborted rotation"
                    );
                }
                return Err(e.into());
            }

            state.keys.insert(
                new_key_id.clone(),
                CachedKey {
                    key: successor.clone(),
                    material: Some(material),
                },
            );
            if let Some(cached) = state.keys.get_mut(&current.key_id) {
                cached.key = retired;
            }
            state.rotation_log = log;
            event
        };

        info!(
            subsystem = SUBSYSTEM,
            old_key_id = %event.old_key_id,
            new_key_id = %event.new_key_id,
            generation = event.generation,
            affected_blocks = event.affected_blocks,
            rotated_by = %event.rotated_by,
            "Key rotated"
        );
        self.publish(ControlPlaneEvent::KeyRotated {
            old_key_id: event.old_key_id.clone(),
            new_key_id: event.new_key_id.clone(),
            generation: event.generation,
        });
        self.notify_clients(event);
        Ok(successor)
    }

    fn notify_clients(&self, event: RotationEvent) {
        if event.notified_clients.is_empty() {
            return;
        }
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            for client in &event.notified_clients {
                if let Err(error) = notifier.notify(client, &event).await {
                    warn!(
                        subsystem = SUBSYSTEM,
                        client_id = %client,
                        new_key_id = %event.new_key_id,
                        %error,
                        "Rotation notice not delivered"
                    );
                }
            }
        });
    }

    /// Revoke a key and record it on the revocation list.
    pub fn revoke(&self, key_id: &str, reason: &str) -> Result<ManagedKey, KeyError> {
        let now = self.time.now();
        let mut state = self.state.lock();

        let current = match state.keys.get(key_id) {
            Some(cached) => cached.key.clone(),
            None => {
                // Evicted keys are EXPIRED; anything else is unknown.
                let record: Option<KeyRecord> =
                    load_record(self.store.as_ref(), KEYS_COLLECTION, key_id)?;
                return Err(match record {
                    Some(r) => KeyError::InvalidKeyState {
                        key_id: key_id.to_string(),
                        status: r.key.status,
                    },
                    None => KeyError::KeyNotFound(key_id.to_string()),
                });
            }
        };
        if current.status.is_terminal() {
            return Err(KeyError::InvalidKeyState {
                key_id: key_id.to_string(),
                status: current.status,
            });
        }

        let mut revoked = current;
        revoked.status = KeyStatus::Revoked;
        let mut revocations = state.revocations.clone();
        revocations.entries.insert(
            key_id.to_string(),
            RevocationEntry {
                reason: reason.to_string(),
                revoked_at: now,
            },
        );

        self.persist_key(&revoked, None)?;
        save_record(
            self.store.as_ref(),
            REVOCATIONS_COLLECTION,
            REVOCATION_LIST_KEY,
            &revocations,
        )?;

        if let Some(cached) = state.keys.get_mut(key_id) {
            cached.key = revoked.clone();
            cached.material = None;
        }
        state.revocations = revocations;
        drop(state);

        warn!(subsystem = SUBSYSTEM, key_id = %key_id, reason = %reason, "Key revoked");
        self.publish(ControlPlaneEvent::KeyRevoked {
            key_id: key_id.to_string(),
            reason: reason.to_string(),
        });
        Ok(revoked)
    }

    /// Run one lifecycle pass over the cache.
    pub fn cleanup_expired(&self) -> Result<CleanupReport, KeyError> {
        let now = self.time.now();
        let grace = self.config.deprecated_grace_ms;
        let mut report = CleanupReport::default();
        let mut state = self.state.lock();

        let ids: Vec<String> = state.keys.keys().cloned().collect();
        for key_id in ids {
            let Some(cached) = state.keys.get(&key_id) else {
                continue;
            };
            let key = &cached.key;
            let has_material = cached.material.is_some();

            let next = match key.status {
                KeyStatus::Rotating if key.is_expired(now) => Some(KeyStatus::Deprecated),
                KeyStatus::Deprecated if now >= key.expires_at.saturating_add(grace) => {
                    Some(KeyStatus::Expired)
                }
                KeyStatus::Active if key.is_expired(now) => Some(KeyStatus::Expired),
                _ => None,
            };

            match next {
                Some(status) => {
                    let mut updated = key.clone();
                    updated.status = status;
                    self.persist_key(&updated, None)?;
                    debug!(subsystem = SUBSYSTEM, key_id = %key_id, %status, "Key lifecycle transition");

                    if has_material {
                        report.cleared += 1;
                    }
                    if status == KeyStatus::Expired {
                        report.expired += 1;
                        report.evicted += 1;
                        state.keys.remove(&key_id);
                    } else {
                        report.deprecated += 1;
                        if let Some(cached) = state.keys.get_mut(&key_id) {
                            cached.key = updated;
                            cached.material = None;
                        }
                    }
                }
                None if has_material && !key.status.is_usable() => {
                    let updated = key.clone();
                    self.persist_key(&updated, None)?;
                    report.cleared += 1;
                    if let Some(cached) = state.keys.get_mut(&key_id) {
                        cached.material = None;
                    }
                }
                None if key.status == KeyStatus::Expired => {
                    state.keys.remove(&key_id);
                    report.evicted += 1;
                }
                None => {}
            }
        }
        drop(state);

        if !report.is_empty() {
            info!(
                subsystem = SUBSYSTEM,
                deprecated = report.deprecated,
                expired = report.expired,
                cleared = report.cleared,
                evicted = report.evicted,
                "Key lifecycle pass"
            );
        }
        Ok(report)
    }

    /// Look a key up in the cache, then the store.
    pub fn key(&self, key_id: &str) -> Result<Option<ManagedKey>, KeyError> {
        if let Some(cached) = self.state.lock().keys.get(key_id) {
            return Ok(Some(cached.key.clone()));
        }
        let record: Option<KeyRecord> = load_record(self.store.as_ref(), KEYS_COLLECTION, key_id)?;
        Ok(record.map(|r| r.key))
    }

    /// Cached keys for a model, oldest generation first.
    pub fn keys_for_model(&self, model_id: &str) -> Vec<ManagedKey> {
        let state = self.state.lock();
        let mut keys: Vec<ManagedKey> = state
            .keys
            .values()
            .filter(|c| c.key.model_id() == model_id)
            .map(|c| c.key.clone())
            .collect();
        keys.sort_by_key(|k| (k.rotation_generation, k.created_at));
        keys
    }

    /// Rotation events, oldest first.
    pub fn rotation_history(&self) -> Vec<RotationEvent> {
        self.state.lock().rotation_log.iter().cloned().collect()
    }

    /// Current revocation list.
    pub fn revocation_list(&self) -> RevocationList {
        self.state.lock().revocations.clone()
    }

    fn persist_key(&self, key: &ManagedKey, material: Option<&SecretKey>) -> Result<(), KeyError> {
        let record = KeyRecord {
            key: key.clone(),
            key_data: material
                .map(|m| BASE64.encode(m.as_bytes()))
                .unwrap_or_default(),
        };
        save_record(self.store.as_ref(), KEYS_COLLECTION, &key.key_id, &record)?;
        Ok(())
    }

    fn discard_record(&self, key_id: &str) {
        if let Err(e) = self.store.delete(KEYS_COLLECTION, key_id) {
            warn!(subsystem = SUBSYSTEM, key_id = %key_id, error = %e, "Orphaned key record left in store");
        }
    }

    fn publish(&self, event: ControlPlaneEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

fn check_rotatable(key: &ManagedKey) -> Result<(), KeyError> {
    if let Some(successor) = &key.successor_key_id {
        return Err(KeyError::AlreadyRotated {
            key_id: key.key_id.clone(),
            successor: successor.clone(),
        });
    }
    if key.status != KeyStatus::Active {
        return Err(KeyError::InvalidKeyState {
            key_id: key.key_id.clone(),
            status: key.status,
        });
    }
    Ok(())
}

fn decode_material(record: &KeyRecord) -> Result<Option<SecretKey>, KeyError> {
    if record.key_data.is_empty() {
        return Ok(None);
    }
    let corrupt = || KeyError::CorruptMaterial {
        key_id: record.key.key_id.clone(),
    };
    let bytes = BASE64.decode(&record.key_data).map_err(|_| corrupt())?;
    SecretKey::from_slice(&bytes).map(Some).map_err(|_| corrupt())
}

#[async_trait]
impl KeyManagementApi for KeyManager {
    async fn derive_hardware_bound_key(
        &self,
        license_key: &str,
        model_id: &str,
        lifetime_days: Option<u32>,
    ) -> Result<ManagedKey, KeyError> {
        KeyManager::derive_hardware_bound_key(self, license_key, model_id, lifetime_days).await
    }

    async fn derive_transfer_key(
        &self,
        license_key: &str,
        model_id: &str,
        session_id: &str,
    ) -> Result<ManagedKey, KeyError> {
        KeyManager::derive_transfer_key(self, license_key, model_id, session_id).await
    }

    async fn get_or_derive(&self, license_key: &str, model_id: &str) -> Result<ManagedKey, KeyError> {
        KeyManager::get_or_derive(self, license_key, model_id).await
    }

    fn validate_binding(&self, key_id: &str) -> bool {
        KeyManager::validate_binding(self, key_id)
    }

    fn key_material(&self, key_id: &str) -> Result<SecretKey, KeyError> {
        KeyManager::key_material(self, key_id)
    }

    async fn rotate(&self, request: RotateKeyRequest) -> Result<ManagedKey, KeyError> {
        KeyManager::rotate(self, request).await
    }

    fn revoke(&self, key_id: &str, reason: &str) -> Result<ManagedKey, KeyError> {
        KeyManager::revoke(self, key_id, reason)
    }

    fn cleanup_expired(&self) -> Result<CleanupReport, KeyError> {
        KeyManager::cleanup_expired(self)
    }
}
