//! Shared fixtures: a control plane on a mock clock, license grants, network
//! registration and a simulated remote node.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use mm_01_key_management::HardwareFingerprintProvider;
use mm_03_resource_allocation::{NetworkResourceProfile, RequestPriority, ResourceQuota};
use mm_05_admission::{JoinPriority, NetworkPolicy, RequesterInfo, SubmitJoinRequest};
use mm_06_secure_transfer::{open_block, BlockAck, BlockMessage, ModelBlock};
use node_runtime::adapters::{Frame, LicenseGrant};
use node_runtime::{ControlPlane, ControlPlaneError, NodeConfig};
use shared_types::{
    InMemoryStore, KeyValueStore, LicenseTier, MockTimeSource, NodeRole, StorageError, Timestamp, DAY_MS,
};

/// Mock clock start.
pub const T0: u64 = DAY_MS;

/// Administrator of every network registered through [`register_network`].
pub const ADMIN: &str = "admin-1";

/// Fingerprint that never changes between builds.
pub struct FixedFingerprint(pub &'static str);

impl HardwareFingerprintProvider for FixedFingerprint {
    fn fingerprint(&self) -> String {
        self.0.to_string()
    }
}

/// A control plane plus the handle of its clock.
pub struct TestPlane {
    pub plane: Arc<ControlPlane>,
    pub clock: Arc<MockTimeSource>,
}

impl TestPlane {
    /// Plane over an in-memory store with `NodeConfig::for_testing()`.
    pub fn new() -> Result<Self, ControlPlaneError> {
        Self::with_config(NodeConfig::for_testing())
    }

    pub fn with_config(config: NodeConfig) -> Result<Self, ControlPlaneError> {
        Self::with_store(config, Arc::new(InMemoryStore::new()), T0)
    }

    /// Plane over `store` with the clock at `now`. Building twice over the
    /// same store simulates a restart.
    pub fn with_store(
        config: NodeConfig,
        store: Arc<dyn KeyValueStore>,
        now: Timestamp,
    ) -> Result<Self, ControlPlaneError> {
        let clock = Arc::new(MockTimeSource::new(now));
        let plane = ControlPlane::build(config, store, clock.clone(), &FixedFingerprint("test-machine"))?;
        Ok(Self {
            plane: Arc::new(plane),
            clock,
        })
    }

    /// Grant `license_key` at `tier`, valid for thirty days.
    pub fn grant_license(&self, license_key: &str, tier: LicenseTier) -> Result<(), StorageError> {
        self.plane.licenses.grant(LicenseGrant {
            license_key: license_key.to_string(),
            tier,
            expires_at: T0 + 30 * DAY_MS,
            max_clients: 5,
            allowed_models: vec![],
        })?;
        Ok(())
    }

    /// Register `network_id` with [`ADMIN`] as administrator and `base` as
    /// both its base and peak envelope.
    pub fn register_network(
        &self,
        network_id: &str,
        tier: LicenseTier,
        base: ResourceQuota,
        verified_identity: bool,
    ) -> Result<(), ControlPlaneError> {
        let mut policy = NetworkPolicy::new(network_id, tier).with_admin(ADMIN);
        if verified_identity {
            policy = policy.with_verified_identity();
        }
        self.plane.register_network(
            policy,
            NetworkResourceProfile::new(network_id, base, base, RequestPriority::Normal),
        )
    }
}

/// Envelope large enough for every scenario's network.
pub fn network_quota() -> ResourceQuota {
    ResourceQuota {
        cpu_millis: 4_000,
        memory_mb: 8_192,
        bandwidth_mbps: 200,
        worker_slots: 4,
        client_slots: 10,
        ..ResourceQuota::ZERO
    }
}

/// Join request for `node_id` with an optional certificate.
pub fn join_request(
    node_id: &str,
    network_id: &str,
    license_key: &str,
    role: NodeRole,
    certificate: Option<Vec<u8>>,
) -> SubmitJoinRequest {
    SubmitJoinRequest {
        requester_id: node_id.to_string(),
        requester_address: "10.0.0.5:7000".to_string(),
        network_id: network_id.to_string(),
        license_key: license_key.to_string(),
        requester_info: RequesterInfo {
            role: Some(role),
            certificate,
            ..RequesterInfo::default()
        },
        priority: JoinPriority::Normal,
        ttl_ms: None,
    }
}

/// `count` blocks of `size` bytes, each filled with its own index.
pub fn model_blocks(count: usize, size: usize) -> Vec<ModelBlock> {
    (0..count)
        .map(|i| ModelBlock::new(format!("block-{i}"), vec![i as u8; size]))
        .collect()
}

// =============================================================================
// SIMULATED NODE
// =============================================================================

#[derive(Default)]
struct NodeState {
    plaintext: BTreeMap<usize, Vec<u8>>,
    attempts: HashMap<usize, u32>,
    rotations: u32,
}

/// Remote node on the far end of a [`ChannelTransport`] channel.
///
/// Decrypts every block with the session key and acknowledges it with the
/// echoed checksum. Blocks listed in `reject_first` are refused that many
/// times before being accepted.
///
/// [`ChannelTransport`]: node_runtime::adapters::ChannelTransport
#[derive(Default)]
pub struct SimulatedNode {
    reject_first: HashMap<usize, u32>,
}

impl SimulatedNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse block `index` the first `times` it arrives.
    pub fn reject_first(mut self, index: usize, times: u32) -> Self {
        self.reject_first.insert(index, times);
        self
    }

    /// Serve `frames` until the channel closes.
    pub fn spawn(self, plane: Arc<ControlPlane>, mut frames: mpsc::Receiver<Frame>) -> NodeHandle {
        let state = Arc::new(Mutex::new(NodeState::default()));
        let shared = state.clone();
        let task = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                match frame {
                    Frame::Block { message, reply } => {
                        let ack = self.answer(&plane, &shared, &message);
                        let _ = reply.send(ack);
                    }
                    Frame::KeyRotated { .. } => shared.lock().rotations += 1,
                }
            }
        });
        NodeHandle { state, task }
    }

    fn answer(&self, plane: &ControlPlane, state: &Mutex<NodeState>, message: &BlockMessage) -> BlockAck {
        let index = message.block_index;
        let attempt = {
            let mut state = state.lock();
            let seen = state.attempts.entry(index).or_insert(0);
            *seen += 1;
            *seen
        };
        if self.reject_first.get(&index).is_some_and(|&n| attempt <= n) {
            return BlockAck::error(format!("simulated refusal {attempt}"));
        }

        let plaintext = plane
            .transfer
            .session(&message.transfer_id)
            .map_err(|e| e.to_string())
            .and_then(|s| plane.keys.key_material(&s.key_id).map_err(|e| e.to_string()))
            .and_then(|key| open_block(&key, message).map_err(|e| e.to_string()));
        match plaintext {
            Ok(data) => {
                state.lock().plaintext.insert(index, data);
                BlockAck::success(message.checksum.clone())
            }
            Err(reason) => BlockAck::error(reason),
        }
    }
}

/// Observations of a running [`SimulatedNode`].
pub struct NodeHandle {
    state: Arc<Mutex<NodeState>>,
    task: JoinHandle<()>,
}

impl NodeHandle {
    /// Decrypted blocks by index.
    pub fn received(&self) -> BTreeMap<usize, Vec<u8>> {
        self.state.lock().plaintext.clone()
    }

    /// How many times block `index` arrived.
    pub fn attempts(&self, index: usize) -> u32 {
        self.state.lock().attempts.get(&index).copied().unwrap_or(0)
    }

    pub fn rotations(&self) -> u32 {
        self.state.lock().rotations
    }

    /// Stop serving. The channel closes once the task is gone.
    pub fn stop(self) {
        self.task.abort();
    }
}
