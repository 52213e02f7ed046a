//! # Control Plane
//!
//! Owns one instance of every subsystem and the adapters that connect them.
//!
//! ## Initialization Order
//!
//! ```text
//! Phase 1: event bus, node channels, license table
//! Phase 2: key manager, authentication, allocator, recovery (no peers)
//! Phase 3: admission (auth, allocator, licenses), transfer (keys, recovery)
//! Phase 4: global admins
//! ```
//!
//! Subsystems never hold each other directly. Every cross-subsystem call goes
//! through an adapter in [`crate::adapters`], and every notification goes
//! through the event bus.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use mm_01_key_management::{HardwareFingerprintProvider, KeyManager, SystemFingerprintProvider};
use mm_02_authentication::AuthenticationManager;
use mm_03_resource_allocation::{NetworkResourceProfile, ResourceAllocator};
use mm_04_connection_recovery::{ConnectionRecovery, RecoveryError};
use mm_05_admission::{AdmissionController, AdmissionError, NetworkPolicy};
use mm_06_secure_transfer::{
    AckStatus, BlockTransport, SecureTransferManager, StoreStagingArea,
};
use shared_bus::InMemoryEventBus;
use shared_types::{InMemoryStore, JsonFileStore, KeyValueStore, SystemTimeSource, TimeSource};

use crate::adapters::{
    AllocatorReserver, CertificateIdentityVerifier, ChannelProbe, ChannelTransport, Frame,
    ManagedTransferKeys, RecoveryLinkMonitor, StoreLicenseTable,
};

use super::authority::load_or_create_authority;
use super::config::NodeConfig;
use super::errors::ControlPlaneError;

const SUBSYSTEM: &str = "node_runtime";

/// Every subsystem of one control-plane node, wired together.
pub struct ControlPlane {
    // =========================================================================
    // SHARED INFRASTRUCTURE
    // =========================================================================
    /// Node configuration (immutable after initialization).
    pub config: NodeConfig,
    pub store: Arc<dyn KeyValueStore>,
    pub time: Arc<dyn TimeSource>,
    /// All subsystem notifications flow through this bus.
    pub bus: Arc<InMemoryEventBus>,
    /// Live channels to connected nodes.
    pub transport: Arc<ChannelTransport>,
    pub staging: Arc<StoreStagingArea>,
    pub licenses: Arc<StoreLicenseTable>,

    // =========================================================================
    // INDEPENDENT SUBSYSTEMS
    // =========================================================================
    pub keys: Arc<KeyManager>,
    pub auth: Arc<AuthenticationManager>,
    pub allocator: Arc<ResourceAllocator>,
    pub recovery: ConnectionRecovery,

    // =========================================================================
    // DEPENDENT SUBSYSTEMS
    // =========================================================================
    /// Uses auth, allocator and licenses through adapters.
    pub admission: Arc<AdmissionController>,
    /// Uses keys and recovery through adapters.
    pub transfer: Arc<SecureTransferManager>,
}

impl ControlPlane {
    /// Build every subsystem over the given store and clock.
    ///
    /// Persisted state (keys, certificates, join requests) is reloaded, so
    /// building twice over the same store resumes where the first left off.
    #[instrument(name = "control_plane_init", skip_all)]
    pub fn build(
        config: NodeConfig,
        store: Arc<dyn KeyValueStore>,
        time: Arc<dyn TimeSource>,
        fingerprint: &dyn HardwareFingerprintProvider,
    ) -> Result<Self, ControlPlaneError> {
        config.validate()?;
        info!(subsystem = SUBSYSTEM, "Initializing model-mesh control plane");

        // =====================================================================
        // PHASE 1: Shared Infrastructure
        // =====================================================================
        info!("Phase 1: Creating shared infrastructure");

        let bus = Arc::new(InMemoryEventBus::new());
        let transport = Arc::new(ChannelTransport::new());
        let staging = Arc::new(StoreStagingArea::new(store.clone(), time.clone()));
        let licenses = Arc::new(StoreLicenseTable::new(store.clone(), time.clone()));
        if let Some(path) = &config.licensing.license_file {
            let imported = licenses.import_file(path)?;
            info!("  License file imported ({} grants)", imported);
        }

        // =====================================================================
        // PHASE 2: Independent Subsystems
        // =====================================================================
        info!("Phase 2: Initializing independent subsystems");

        let keys = KeyManager::new(config.keys.clone(), store.clone(), time.clone(), fingerprint)
            .with_notifier(transport.clone())
            .with_event_publisher(bus.clone());
        let restored_keys = keys.load()?;
        let keys = Arc::new(keys);
        info!("  [1] Key Management initialized ({} keys restored)", restored_keys);

        let authority = load_or_create_authority(store.as_ref(), keys.fingerprint(), &config.auth, time.now())?;
        let auth = AuthenticationManager::with_authority(config.auth.clone(), authority, store.clone(), time.clone())
            .with_event_publisher(bus.clone());
        let restored_certs = auth.load()?;
        let auth = Arc::new(auth);
        info!("  [2] Authentication initialized ({} certificates restored)", restored_certs);

        let allocator = Arc::new(
            ResourceAllocator::new(config.allocator.clone(), time.clone()).with_event_publisher(bus.clone()),
        );
        info!(
            "  [3] Resource Allocation initialized (strategy: {})",
            config.allocator.strategy.as_str()
        );

        let recovery = ConnectionRecovery::new(config.recovery.clone(), time.clone()).with_event_publisher(bus.clone());
        info!("  [4] Connection Recovery initialized");

        // =====================================================================
        // PHASE 3: Dependent Subsystems
        // =====================================================================
        info!("Phase 3: Initializing dependent subsystems");

        let admission = AdmissionController::new(config.admission.clone(), store.clone(), time.clone(), licenses.clone())
            .with_identity_verifier(Arc::new(CertificateIdentityVerifier::new(auth.clone())))
            .with_reserver(Arc::new(AllocatorReserver::new(allocator.clone())))
            .with_event_publisher(bus.clone());
        let restored_requests = admission.load()?;
        let admission = Arc::new(admission);
        info!("  [5] Admission initialized ({} join requests restored)", restored_requests);

        let transfer = Arc::new(
            SecureTransferManager::new(
                config.transfer.clone(),
                Arc::new(ManagedTransferKeys::new(keys.clone())),
                time.clone(),
            )
            .with_transport(transport.clone())
            .with_staging(staging.clone())
            .with_link_monitor(Arc::new(RecoveryLinkMonitor::new(recovery.clone())))
            .with_event_publisher(bus.clone()),
        );
        info!("  [6] Secure Transfer initialized");

        // =====================================================================
        // PHASE 4: Global Admins
        // =====================================================================
        for admin in &config.admins.global {
            admission.add_global_admin(admin.clone());
        }
        info!("Phase 4: {} global admins registered", config.admins.global.len());

        info!(subsystem = SUBSYSTEM, "Control plane ready");

        Ok(Self {
            config,
            store,
            time,
            bus,
            transport,
            staging,
            licenses,
            keys,
            auth,
            allocator,
            recovery,
            admission,
            transfer,
        })
    }

    /// Build with the storage the configuration names, the wall clock and
    /// this machine's fingerprint.
    pub fn open(config: NodeConfig) -> Result<Self, ControlPlaneError> {
        let store: Arc<dyn KeyValueStore> = if config.storage.in_memory {
            Arc::new(InMemoryStore::new())
        } else {
            Arc::new(JsonFileStore::open(&config.storage.data_dir)?)
        };
        Self::build(config, store, Arc::new(SystemTimeSource), &SystemFingerprintProvider::new())
    }

    // =========================================================================
    // NETWORKS
    // =========================================================================

    /// Register a network with admission and the allocator together.
    pub fn register_network(
        &self,
        policy: NetworkPolicy,
        profile: NetworkResourceProfile,
    ) -> Result<(), ControlPlaneError> {
        if policy.network_id != profile.network_id {
            return Err(AdmissionError::InvalidRequest(format!(
                "policy is for {} but resources are for {}",
                policy.network_id, profile.network_id
            ))
            .into());
        }
        if self.admission.policy(&policy.network_id).is_some() {
            return Err(AdmissionError::NetworkExists(policy.network_id).into());
        }
        self.allocator.register_network(profile)?;
        self.admission.register_network(policy)?;
        Ok(())
    }

    // =========================================================================
    // NODE CONNECTIONS
    // =========================================================================

    /// Open a channel for `node_id` and start tracking its link health.
    ///
    /// Reconnecting a node that is already tracked marks its link healthy.
    pub fn connect_node(&self, node_id: &str) -> Result<mpsc::Receiver<Frame>, ControlPlaneError> {
        let frames = self.transport.connect(node_id);
        let probe = Arc::new(ChannelProbe::new(self.transport.clone()));
        match self.recovery.register(node_id, probe) {
            Ok(()) => {}
            Err(RecoveryError::AlreadyRegistered(_)) => self.recovery.on_healthy(node_id, 0)?,
            Err(e) => {
                self.transport.disconnect(node_id);
                return Err(e.into());
            }
        }
        info!(subsystem = SUBSYSTEM, node_id = %node_id, "Node connected");
        Ok(frames)
    }

    /// Close the channel of `node_id` and stop tracking it.
    pub fn disconnect_node(&self, node_id: &str) -> bool {
        let had_channel = self.transport.disconnect(node_id);
        let was_tracked = self.recovery.unregister(node_id).is_ok();
        if had_channel || was_tracked {
            info!(subsystem = SUBSYSTEM, node_id = %node_id, "Node disconnected");
        }
        had_channel || was_tracked
    }

    /// Send every block staged for `node_id` while it was offline.
    ///
    /// Acknowledged blocks leave the staging area. A rejected block stays
    /// staged. Stops at the first transport failure.
    pub async fn deliver_staged(&self, node_id: &str) -> Result<usize, ControlPlaneError> {
        let staged = self.staging.staged_for(node_id)?;
        let mut delivered = 0;
        for block in staged {
            let message = &block.message;
            let ack = self.transport.send_block(node_id, message).await?;
            let echoed = ack
                .checksum
                .as_deref()
                .map_or(true, |echo| echo.eq_ignore_ascii_case(&message.checksum));
            if ack.status == AckStatus::Success && echoed {
                self.staging.remove(&message.transfer_id, message.block_index)?;
                delivered += 1;
            } else {
                warn!(
                    subsystem = SUBSYSTEM,
                    node_id = %node_id,
                    transfer_id = %message.transfer_id,
                    block_index = message.block_index,
                    error = ?ack.error,
                    "Staged block not accepted"
                );
            }
        }
        if delivered > 0 {
            info!(subsystem = SUBSYSTEM, node_id = %node_id, delivered, "Staged blocks delivered");
        }
        Ok(delivered)
    }

    /// Stop recovery loops. Persisted state needs no flushing.
    pub fn shutdown(&self) {
        self.recovery.shutdown();
        info!(subsystem = SUBSYSTEM, "Control plane stopped");
    }
}
