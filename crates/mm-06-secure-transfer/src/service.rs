//! # Secure Transfer Service
//!
//! Sessions live in one map behind a `parking_lot::Mutex`. `run` spawns one
//! task per pending block into a `JoinSet`; every task first takes a permit
//! from the manager-wide semaphore, so no more than `max_concurrent_blocks`
//! blocks are on the wire at once across all sessions. Tasks update their
//! own block under the lock and never hold it across an `.await`.

use crate::domain::{
    seal_block, AckStatus, BlockMessage, BlockStatus, BlockTransferInfo, ModelBlock,
    SessionStatus, StartTransfer, TransferConfig, TransferError, TransferProgress,
    TransferSession,
};
use crate::ports::{
    BlockTransport, LinkMonitor, SecureTransferApi, StagingArea, TransferKey, TransferKeyProvider,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_bus::{CallbackRegistry, CallbackResult, ControlPlaneEvent, EventPublisher};
use shared_crypto::SecretKey;
use shared_types::{TimeSource, Timestamp};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SUBSYSTEM: &str = "secure_transfer";

struct SessionEntry {
    session: TransferSession,
    payloads: Arc<Vec<ModelBlock>>,
    key: SecretKey,
    /// Replaced on resume so workers of an earlier run stay stopped.
    cancelled: Arc<AtomicBool>,
    /// Start of the current run and bytes already delivered before it.
    run_started_at: Option<Timestamp>,
    run_base_bytes: u64,
    run_base_blocks: usize,
}

type Sessions = Arc<Mutex<HashMap<String, SessionEntry>>>;

/// How a block left the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Acknowledged,
    Staged,
}

/// Everything a block task needs, cloned per task.
#[derive(Clone)]
struct BlockWorker {
    session_id: String,
    client_id: String,
    config: TransferConfig,
    time: Arc<dyn TimeSource>,
    sessions: Sessions,
    payloads: Arc<Vec<ModelBlock>>,
    key: SecretKey,
    cancelled: Arc<AtomicBool>,
    in_flight: Arc<Semaphore>,
    transport: Option<Arc<dyn BlockTransport>>,
    staging: Option<Arc<dyn StagingArea>>,
    link: Option<Arc<dyn LinkMonitor>>,
}

impl BlockWorker {
    fn with_block<R>(&self, index: usize, f: impl FnOnce(&mut BlockTransferInfo) -> R) -> Option<R> {
        let mut sessions = self.sessions.lock();
        let block = sessions
            .get_mut(&self.session_id)?
            .session
            .blocks
            .get_mut(index)?;
        Some(f(block))
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn run_block(self, index: usize) {
        let Ok(_permit) = self.in_flight.clone().acquire_owned().await else {
            return;
        };
        if self.is_cancelled() {
            return;
        }
        let claimed = self
            .with_block(index, |b| {
                if b.status != BlockStatus::Pending {
                    return false;
                }
                b.status = BlockStatus::InProgress;
                true
            })
            .unwrap_or(false);
        if !claimed {
            return;
        }
        let Some(block) = self.payloads.get(index) else {
            return;
        };

        let mut failures: u32 = 0;
        loop {
            let result = match seal_block(&self.key, &self.session_id, index, block) {
                Ok(message) => self.attempt(&message).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(delivery) => {
                    let now = self.time.now();
                    self.with_block(index, |b| {
                        if b.status == BlockStatus::InProgress {
                            b.status = BlockStatus::Completed;
                            b.completed_at = Some(now);
                            b.last_error = None;
                        }
                    });
                    debug!(
                        subsystem = SUBSYSTEM,
                        session_id = %self.session_id,
                        block_id = %block.block_id,
                        ?delivery,
                        "Block delivered"
                    );
                    return;
                }
                Err(err) => {
                    failures += 1;
                    let exhausted = !err.is_retryable() || failures > self.config.max_retries;
                    let reason = err.to_string();
                    self.with_block(index, |b| {
                        if b.status == BlockStatus::InProgress {
                            b.retry_count += 1;
                            b.last_error = Some(reason);
                            if exhausted {
                                b.status = BlockStatus::Failed;
                            }
                        }
                    });
                    if exhausted {
                        warn!(
                            subsystem = SUBSYSTEM,
                            session_id = %self.session_id,
                            block_id = %block.block_id,
                            failures,
                            reason = err.reason_code(),
                            "Block failed"
                        );
                        return;
                    }
                    debug!(
                        subsystem = SUBSYSTEM,
                        session_id = %self.session_id,
                        block_id = %block.block_id,
                        failures,
                        reason = err.reason_code(),
                        "Block attempt failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay(failures - 1)).await;
                    if self.is_cancelled() {
                        return;
                    }
                }
            }
        }
    }

    /// One send, or one staging write when the client has no live channel.
    async fn attempt(&self, message: &BlockMessage) -> Result<Delivery, TransferError> {
        let client_id = self.client_id.as_str();
        if let Some(link) = &self.link {
            if link.is_circuit_open(client_id) {
                return Err(TransferError::CircuitOpen {
                    client_id: client_id.to_string(),
                });
            }
        }

        let transport = match &self.transport {
            Some(t) if t.is_connected(client_id) => t,
            _ => {
                return match &self.staging {
                    Some(staging) => staging.stage(client_id, message).map(|()| Delivery::Staged),
                    None => Err(TransferError::NoRoute {
                        client_id: client_id.to_string(),
                    }),
                };
            }
        };

        let sent_at = tokio::time::Instant::now();
        let reply =
            tokio::time::timeout(self.config.ack_timeout(), transport.send_block(client_id, message))
                .await;
        let ack = match reply {
            Err(_) => {
                let err = TransferError::AckTimeout {
                    timeout_ms: self.config.ack_timeout_ms,
                };
                self.report_failure(&err);
                return Err(err);
            }
            Ok(Err(err)) => {
                self.report_failure(&err);
                return Err(err);
            }
            Ok(Ok(ack)) => ack,
        };

        if let Some(link) = &self.link {
            link.report_success(client_id, sent_at.elapsed().as_millis() as u64);
        }

        match ack.status {
            AckStatus::Error => Err(TransferError::Rejected {
                reason: ack.error.unwrap_or_else(|| "unspecified".to_string()),
            }),
            AckStatus::Success => match ack.checksum {
                Some(echo) if !echo.eq_ignore_ascii_case(&message.checksum) => {
                    Err(TransferError::AckChecksumMismatch {
                        block_id: message.block_id.clone(),
                    })
                }
                _ => Ok(Delivery::Acknowledged),
            },
        }
    }

    fn report_failure(&self, err: &TransferError) {
        if let Some(link) = &self.link {
            link.report_failure(&self.client_id, err.reason_code());
        }
    }
}

/// Encrypted, resumable block transfer to clients.
pub struct SecureTransferManager {
    config: TransferConfig,
    time: Arc<dyn TimeSource>,
    keys: Arc<dyn TransferKeyProvider>,
    transport: Option<Arc<dyn BlockTransport>>,
    staging: Option<Arc<dyn StagingArea>>,
    link: Option<Arc<dyn LinkMonitor>>,
    events: Option<Arc<dyn EventPublisher>>,
    progress_callbacks: CallbackRegistry<TransferProgress>,
    in_flight: Arc<Semaphore>,
    sessions: Sessions,
}

impl SecureTransferManager {
    pub fn new(
        config: TransferConfig,
        keys: Arc<dyn TransferKeyProvider>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let permits = config.max_concurrent_blocks.max(1);
        Self {
            config,
            time,
            keys,
            transport: None,
            staging: None,
            link: None,
            events: None,
            progress_callbacks: CallbackRegistry::new(SUBSYSTEM),
            in_flight: Arc::new(Semaphore::new(permits)),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn BlockTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_staging(mut self, staging: Arc<dyn StagingArea>) -> Self {
        self.staging = Some(staging);
        self
    }

    pub fn with_link_monitor(mut self, link: Arc<dyn LinkMonitor>) -> Self {
        self.link = Some(link);
        self
    }

    pub fn with_event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Register a progress callback, fired after every finished block.
    pub fn on_progress<F>(&self, label: impl Into<String>, callback: F)
    where
        F: Fn(&TransferProgress) -> CallbackResult + Send + Sync + 'static,
    {
        self.progress_callbacks.register(label, callback);
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    /// Validate the block list, derive the session key and register the session.
    pub async fn start_session(&self, request: StartTransfer) -> Result<String, TransferError> {
        self.validate(&request)?;

        let session_id = Uuid::new_v4().to_string();
        let TransferKey { key_id, key } = self
            .keys
            .transfer_key(&request.license_key, &request.model_id, &session_id)
            .await?;

        let blocks: Vec<BlockTransferInfo> = request
            .blocks
            .iter()
            .enumerate()
            .map(|(index, b)| BlockTransferInfo {
                block_id: b.block_id.clone(),
                index,
                size: b.size(),
                checksum: b.checksum.clone(),
                status: BlockStatus::Pending,
                retry_count: 0,
                last_error: None,
                completed_at: None,
            })
            .collect();
        let total_bytes = blocks.iter().map(|b| b.size).sum();

        let session = TransferSession {
            session_id: session_id.clone(),
            admin_id: request.admin_id,
            client_id: request.client_id,
            model_id: request.model_id,
            key_id,
            status: SessionStatus::Created,
            blocks,
            total_bytes,
            created_at: self.time.now(),
            started_at: None,
            finished_at: None,
        };

        info!(
            subsystem = SUBSYSTEM,
            session_id = %session_id,
            client_id = %session.client_id,
            model_id = %session.model_id,
            blocks = session.blocks.len(),
            total_bytes,
            "Transfer session created"
        );

        self.sessions.lock().insert(
            session_id.clone(),
            SessionEntry {
                session,
                payloads: Arc::new(request.blocks),
                key,
                cancelled: Arc::new(AtomicBool::new(false)),
                run_started_at: None,
                run_base_bytes: 0,
                run_base_blocks: 0,
            },
        );
        Ok(session_id)
    }

    fn validate(&self, request: &StartTransfer) -> Result<(), TransferError> {
        for (field, value) in [
            ("admin_id", &request.admin_id),
            ("client_id", &request.client_id),
            ("model_id", &request.model_id),
        ] {
            if value.is_empty() {
                return Err(TransferError::InvalidRequest(format!("{field} is empty")));
            }
        }
        if request.blocks.is_empty() {
            return Err(TransferError::InvalidRequest("no blocks to transfer".into()));
        }
        let mut seen = HashSet::new();
        for block in &request.blocks {
            if block.block_id.is_empty() {
                return Err(TransferError::InvalidRequest("block id is empty".into()));
            }
            if !seen.insert(block.block_id.as_str()) {
                return Err(TransferError::InvalidRequest(format!(
                    "duplicate block id {}",
                    block.block_id
                )));
            }
            if block.size() > self.config.max_block_size {
                return Err(TransferError::InvalidRequest(format!(
                    "block {} is {} bytes, limit is {}",
                    block.block_id,
                    block.size(),
                    self.config.max_block_size
                )));
            }
        }
        Ok(())
    }

    // =========================================================================
    // RUN / RESUME / CANCEL
    // =========================================================================

    /// Transfer every PENDING block of a CREATED session.
    ///
    /// Returns once each block has completed, failed or been cancelled.
    pub async fn run(&self, session_id: &str) -> Result<TransferSession, TransferError> {
        let (worker, pending) = {
            let now = self.time.now();
            let mut sessions = self.sessions.lock();
            let entry = sessions
                .get_mut(session_id)
                .ok_or_else(|| TransferError::SessionNotFound(session_id.to_string()))?;
            if entry.session.status != SessionStatus::Created {
                return Err(TransferError::InvalidSessionState {
                    session_id: session_id.to_string(),
                    status: entry.session.status,
                });
            }
            entry.session.status = SessionStatus::Running;
            entry.session.started_at.get_or_insert(now);
            entry.run_started_at = Some(now);
            entry.run_base_bytes = entry.session.completed_bytes();
            entry.run_base_blocks = entry.session.completed_blocks();

            let pending: Vec<usize> = entry
                .session
                .blocks
                .iter()
                .filter(|b| b.status == BlockStatus::Pending)
                .map(|b| b.index)
                .collect();
            let worker = BlockWorker {
                session_id: session_id.to_string(),
                client_id: entry.session.client_id.clone(),
                config: self.config.clone(),
                time: Arc::clone(&self.time),
                sessions: Arc::clone(&self.sessions),
                payloads: Arc::clone(&entry.payloads),
                key: entry.key.clone(),
                cancelled: Arc::clone(&entry.cancelled),
                in_flight: Arc::clone(&self.in_flight),
                transport: self.transport.clone(),
                staging: self.staging.clone(),
                link: self.link.clone(),
            };
            (worker, pending)
        };

        info!(
            subsystem = SUBSYSTEM,
            session_id = %session_id,
            pending = pending.len(),
            "Transfer started"
        );

        let mut tasks = JoinSet::new();
        for index in pending {
            tasks.spawn(worker.clone().run_block(index));
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(subsystem = SUBSYSTEM, session_id = %session_id, error = %e, "Block task aborted");
            }
            self.report_progress(session_id);
        }

        self.finalize(session_id)
    }

    fn finalize(&self, session_id: &str) -> Result<TransferSession, TransferError> {
        let now = self.time.now();
        let (snapshot, sent_this_run) = {
            let mut sessions = self.sessions.lock();
            let entry = sessions
                .get_mut(session_id)
                .ok_or_else(|| TransferError::SessionNotFound(session_id.to_string()))?;
            let cancelled = entry.cancelled.load(Ordering::SeqCst);
            for block in &mut entry.session.blocks {
                if matches!(block.status, BlockStatus::Pending | BlockStatus::InProgress) {
                    if cancelled {
                        block.status = BlockStatus::Cancelled;
                    } else {
                        block.status = BlockStatus::Failed;
                        block.last_error = Some("block task stopped".to_string());
                    }
                }
            }
            entry.session.status = if entry.session.all_completed() {
                SessionStatus::Completed
            } else if cancelled {
                SessionStatus::Cancelled
            } else {
                SessionStatus::Failed
            };
            entry.session.finished_at = Some(now);
            entry.run_started_at = None;
            let sent = entry
                .session
                .completed_blocks()
                .saturating_sub(entry.run_base_blocks);
            (entry.session.clone(), sent)
        };

        if sent_this_run > 0 {
            self.keys.record_usage(&snapshot.key_id, sent_this_run as u64);
        }

        match snapshot.status {
            SessionStatus::Completed => {
                info!(
                    subsystem = SUBSYSTEM,
                    session_id = %session_id,
                    blocks = snapshot.blocks.len(),
                    "Transfer completed"
                );
                self.publish(ControlPlaneEvent::TransferCompleted {
                    session_id: session_id.to_string(),
                    blocks: snapshot.completed_blocks(),
                });
            }
            status => {
                let failed = snapshot.failed_blocks();
                let cancelled = snapshot.cancelled_blocks();
                warn!(
                    subsystem = SUBSYSTEM,
                    session_id = %session_id,
                    %status,
                    completed = snapshot.completed_blocks(),
                    failed,
                    cancelled,
                    "Transfer ended incomplete"
                );
                self.publish(ControlPlaneEvent::TransferFailed {
                    session_id: session_id.to_string(),
                    failed_blocks: failed + cancelled,
                });
            }
        }
        Ok(snapshot)
    }

    /// Re-queue FAILED and CANCELLED blocks of an ended session and run again.
    /// COMPLETED blocks are not resent.
    pub async fn resume(&self, session_id: &str) -> Result<TransferSession, TransferError> {
        {
            let mut sessions = self.sessions.lock();
            let entry = sessions
                .get_mut(session_id)
                .ok_or_else(|| TransferError::SessionNotFound(session_id.to_string()))?;
            if !matches!(
                entry.session.status,
                SessionStatus::Failed | SessionStatus::Cancelled
            ) {
                return Err(TransferError::InvalidSessionState {
                    session_id: session_id.to_string(),
                    status: entry.session.status,
                });
            }
            let mut requeued = 0usize;
            for block in &mut entry.session.blocks {
                if matches!(block.status, BlockStatus::Failed | BlockStatus::Cancelled) {
                    block.status = BlockStatus::Pending;
                    block.last_error = None;
                    requeued += 1;
                }
            }
            entry.cancelled = Arc::new(AtomicBool::new(false));
            entry.session.status = SessionStatus::Created;
            entry.session.finished_at = None;
            info!(subsystem = SUBSYSTEM, session_id = %session_id, requeued, "Transfer resumed");
        }
        self.run(session_id).await
    }

    /// Stop scheduling blocks. In-flight and pending blocks become CANCELLED;
    /// a running session ends CANCELLED once its tasks drain.
    pub fn cancel(&self, session_id: &str) -> Result<(), TransferError> {
        let now = self.time.now();
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| TransferError::SessionNotFound(session_id.to_string()))?;
        match entry.session.status {
            SessionStatus::Created | SessionStatus::Running => {}
            status => {
                return Err(TransferError::InvalidSessionState {
                    session_id: session_id.to_string(),
                    status,
                })
            }
        }
        entry.cancelled.store(true, Ordering::SeqCst);
        for block in &mut entry.session.blocks {
            if matches!(block.status, BlockStatus::Pending | BlockStatus::InProgress) {
                block.status = BlockStatus::Cancelled;
            }
        }
        if entry.session.status == SessionStatus::Created {
            entry.session.status = SessionStatus::Cancelled;
            entry.session.finished_at = Some(now);
        }
        info!(subsystem = SUBSYSTEM, session_id = %session_id, "Transfer cancelled");
        Ok(())
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn session(&self, session_id: &str) -> Result<TransferSession, TransferError> {
        self.sessions
            .lock()
            .get(session_id)
            .map(|e| e.session.clone())
            .ok_or_else(|| TransferError::SessionNotFound(session_id.to_string()))
    }

    pub fn progress(&self, session_id: &str) -> Result<TransferProgress, TransferError> {
        let now = self.time.now();
        self.sessions
            .lock()
            .get(session_id)
            .map(|e| progress_of(e, now))
            .ok_or_else(|| TransferError::SessionNotFound(session_id.to_string()))
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    fn report_progress(&self, session_id: &str) {
        let Ok(progress) = self.progress(session_id) else {
            return;
        };
        self.progress_callbacks.fire(&progress);
        self.publish(ControlPlaneEvent::TransferProgress {
            session_id: session_id.to_string(),
            percent: progress.percent,
        });
    }

    fn publish(&self, event: ControlPlaneEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

/// Throughput is measured over the current run only.
fn progress_of(entry: &SessionEntry, now: Timestamp) -> TransferProgress {
    let session = &entry.session;
    let bytes_transferred = session.completed_bytes();
    let throughput = entry.run_started_at.and_then(|started| {
        let elapsed_ms = now.saturating_sub(started);
        let sent = bytes_transferred.saturating_sub(entry.run_base_bytes);
        (elapsed_ms > 0 && sent > 0).then(|| sent as f64 * 1000.0 / elapsed_ms as f64)
    });
    let remaining = session.total_bytes.saturating_sub(bytes_transferred);
    let eta_ms = throughput.map(|rate| (remaining as f64 / rate * 1000.0).ceil() as u64);

    TransferProgress {
        session_id: session.session_id.clone(),
        total_blocks: session.blocks.len(),
        completed_blocks: session.completed_blocks(),
        failed_blocks: session.failed_blocks(),
        percent: session.percent_complete(),
        bytes_transferred,
        total_bytes: session.total_bytes,
        throughput_bytes_per_sec: throughput,
        eta_ms,
    }
}

#[async_trait]
impl SecureTransferApi for SecureTransferManager {
    async fn start_session(&self, request: StartTransfer) -> Result<String, TransferError> {
        SecureTransferManager::start_session(self, request).await
    }

    async fn run(&self, session_id: &str) -> Result<TransferSession, TransferError> {
        SecureTransferManager::run(self, session_id).await
    }

    async fn resume(&self, session_id: &str) -> Result<TransferSession, TransferError> {
        SecureTransferManager::resume(self, session_id).await
    }

    fn cancel(&self, session_id: &str) -> Result<(), TransferError> {
        SecureTransferManager::cancel(self, session_id)
    }

    fn progress(&self, session_id: &str) -> Result<TransferProgress, TransferError> {
        SecureTransferManager::progress(self, session_id)
    }
}
