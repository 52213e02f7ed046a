//! In-process per-node channels.
//!
//! Each connected node owns the receiving end of a bounded frame channel.
//! Blocks travel with a one-shot reply slot so the sender can await the
//! acknowledgement.

use async_trait::async_trait;
use mesh_telemetry::{HistogramTimer, TRANSFER_BLOCK_DURATION};
use mm_01_key_management::{KeyRotationNotifier, RotationEvent};
use mm_04_connection_recovery::{ConnectionProbe, RecoveryError};
use mm_06_secure_transfer::{BlockAck, BlockMessage, BlockTransport, TransferError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

const SUBSYSTEM: &str = "node_runtime";

/// Frames buffered per node before senders wait.
pub const DEFAULT_FRAME_CAPACITY: usize = 32;

/// What a node receives.
#[derive(Debug)]
pub enum Frame {
    /// A sealed block. Reply through `reply`.
    Block {
        message: BlockMessage,
        reply: oneshot::Sender<BlockAck>,
    },
    /// A key the node holds was rotated.
    KeyRotated {
        old_key_id: String,
        new_key_id: String,
        model_id: String,
        generation: u32,
    },
}

/// Registry of live node channels.
pub struct ChannelTransport {
    capacity: usize,
    peers: Mutex<HashMap<String, mpsc::Sender<Frame>>>,
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FRAME_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            peers: Mutex::new(HashMap::new()),
        }
    }

    /// Open a channel for `node_id`, replacing any previous one.
    pub fn connect(&self, node_id: &str) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let replaced = self.peers.lock().insert(node_id.to_string(), tx).is_some();
        debug!(subsystem = SUBSYSTEM, node_id = %node_id, replaced, "Node channel opened");
        rx
    }

    /// Drop the channel of `node_id`. Returns `true` if one existed.
    pub fn disconnect(&self, node_id: &str) -> bool {
        self.peers.lock().remove(node_id).is_some()
    }

    /// Nodes whose receiver is still alive.
    pub fn connected_nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self
            .peers
            .lock()
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .map(|(id, _)| id.clone())
            .collect();
        nodes.sort();
        nodes
    }

    fn sender(&self, node_id: &str) -> Option<mpsc::Sender<Frame>> {
        self.peers
            .lock()
            .get(node_id)
            .filter(|tx| !tx.is_closed())
            .cloned()
    }

    async fn deliver(&self, node_id: &str, frame: Frame) -> Result<(), TransferError> {
        let tx = self.sender(node_id).ok_or_else(|| TransferError::NoRoute {
            client_id: node_id.to_string(),
        })?;
        tx.send(frame)
            .await
            .map_err(|_| TransferError::TransportFailed(format!("channel to {node_id} closed")))
    }
}

#[async_trait]
impl BlockTransport for ChannelTransport {
    fn is_connected(&self, client_id: &str) -> bool {
        self.sender(client_id).is_some()
    }

    async fn send_block(&self, client_id: &str, message: &BlockMessage) -> Result<BlockAck, TransferError> {
        let _timer = HistogramTimer::new(&TRANSFER_BLOCK_DURATION);
        let (reply, ack) = oneshot::channel();
        self.deliver(
            client_id,
            Frame::Block {
                message: message.clone(),
                reply,
            },
        )
        .await?;
        ack.await
            .map_err(|_| TransferError::TransportFailed(format!("{client_id} dropped the reply")))
    }
}

#[async_trait]
impl KeyRotationNotifier for ChannelTransport {
    async fn notify(&self, client_id: &str, event: &RotationEvent) -> Result<(), String> {
        self.deliver(
            client_id,
            Frame::KeyRotated {
                old_key_id: event.old_key_id.clone(),
                new_key_id: event.new_key_id.clone(),
                model_id: event.model_id.clone(),
                generation: event.generation,
            },
        )
        .await
        .map_err(|e| e.reason_code().to_string())
    }
}

/// Reconnect probe that succeeds once the node has a live channel again.
#[derive(Clone)]
pub struct ChannelProbe {
    transport: Arc<ChannelTransport>,
}

impl ChannelProbe {
    pub fn new(transport: Arc<ChannelTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ConnectionProbe for ChannelProbe {
    async fn reconnect(&self, connection_id: &str) -> Result<u64, RecoveryError> {
        let started = tokio::time::Instant::now();
        if self.transport.is_connected(connection_id) {
            Ok(started.elapsed().as_millis() as u64)
        } else {
            Err(RecoveryError::ProbeFailed(format!("no channel to {connection_id}")))
        }
    }
}
