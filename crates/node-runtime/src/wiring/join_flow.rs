//! # Node Join Flow
//!
//! Drives one node from provisioning to a delivered model:
//!
//! ```text
//! provision_identity ─► admission.submit ─► approve
//!   (license check,       (tier, rate limit,   (decide → reservation,
//!    certificate issue)    identity check)      transfer session → run)
//! ```
//!
//! Submission goes straight to [`AdmissionController::submit`](mm_05_admission::AdmissionController::submit);
//! only the steps that span several subsystems live here. A failed decision
//! stops the flow before any key or transfer session exists.

use std::sync::Arc;

use mesh_telemetry::log_event;
use mm_02_authentication::{AuthError, NodeCredentials};
use mm_05_admission::{AdmissionError, ApprovalDecision, JoinRequest};
use mm_06_secure_transfer::{ModelBlock, SessionStatus, StartTransfer, TransferError, TransferSession};
use shared_crypto::SigningAlgorithm;
use shared_types::{ErrorCategory, LicenseError, LicenseValidator, ModelId, NodeRole};
use thiserror::Error;

use crate::container::ControlPlane;

const SUBSYSTEM: &str = "node_runtime";

#[derive(Debug, Error)]
pub enum JoinFlowError {
    #[error(transparent)]
    License(#[from] LicenseError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl JoinFlowError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            JoinFlowError::License(e) => e.category(),
            JoinFlowError::Auth(e) => e.category(),
            JoinFlowError::Admission(e) => e.category(),
            JoinFlowError::Transfer(e) => e.category(),
        }
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            JoinFlowError::License(e) => e.reason_code(),
            JoinFlowError::Auth(e) => e.reason_code(),
            JoinFlowError::Admission(e) => e.reason_code(),
            JoinFlowError::Transfer(e) => e.reason_code(),
        }
    }
}

/// A model to push to the node once it is approved.
#[derive(Debug, Clone)]
pub struct ModelDelivery {
    pub model_id: ModelId,
    /// License the transfer key is derived from.
    pub license_key: String,
    pub blocks: Vec<ModelBlock>,
}

/// Result of an approval.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// The request after the decision.
    pub request: JoinRequest,
    pub decision: ApprovalDecision,
    /// Present when a model was delivered.
    pub transfer: Option<TransferSession>,
}

impl JoinOutcome {
    /// Approved and, if a model was sent, every block delivered or staged.
    pub fn is_complete(&self) -> bool {
        self.decision.approved
            && self
                .transfer
                .as_ref()
                .map_or(true, |s| s.status == SessionStatus::Completed)
    }
}

pub struct JoinFlow {
    plane: Arc<ControlPlane>,
}

impl JoinFlow {
    pub fn new(plane: Arc<ControlPlane>) -> Self {
        Self { plane }
    }

    /// Issue credentials for `node_id`, bound to a valid license.
    pub async fn provision_identity(
        &self,
        node_id: &str,
        role: NodeRole,
        license_key: &str,
    ) -> Result<NodeCredentials, JoinFlowError> {
        let license = self.plane.licenses.validate(license_key).await?;
        let credentials = self
            .plane
            .auth
            .issue(node_id, role, Some(&license), SigningAlgorithm::default())?;
        log_event!(
            info,
            SUBSYSTEM,
            "Node identity provisioned",
            node_id = %node_id,
            %role,
            tier = %license.tier
        );
        Ok(credentials)
    }

    /// Approve a pending request and, given a model, deliver it.
    ///
    /// Blocks for a node without a live channel are staged and count as
    /// delivered. They reach the node through
    /// [`ControlPlane::deliver_staged`] once it connects.
    pub async fn approve(
        &self,
        request_id: &str,
        admin_id: &str,
        notes: &str,
        delivery: Option<ModelDelivery>,
    ) -> Result<JoinOutcome, JoinFlowError> {
        let decision = self
            .plane
            .admission
            .decide(request_id, admin_id, true, notes)
            .await?;
        let request = self
            .plane
            .admission
            .get(request_id)
            .ok_or_else(|| AdmissionError::RequestNotFound(request_id.to_string()))?;

        let transfer = match delivery {
            Some(delivery) => Some(self.deliver(admin_id, &request.requester_id, delivery).await?),
            None => None,
        };

        let outcome = JoinOutcome {
            request,
            decision,
            transfer,
        };
        log_event!(
            info,
            SUBSYSTEM,
            "Join approved",
            request_id = %request_id,
            node_id = %outcome.request.requester_id,
            allocation_id = ?outcome.decision.allocation_id,
            complete = outcome.is_complete()
        );
        Ok(outcome)
    }

    /// Reject a pending request.
    pub async fn reject(
        &self,
        request_id: &str,
        admin_id: &str,
        notes: &str,
    ) -> Result<ApprovalDecision, JoinFlowError> {
        Ok(self
            .plane
            .admission
            .decide(request_id, admin_id, false, notes)
            .await?)
    }

    async fn deliver(
        &self,
        admin_id: &str,
        node_id: &str,
        delivery: ModelDelivery,
    ) -> Result<TransferSession, JoinFlowError> {
        let session_id = self
            .plane
            .transfer
            .start_session(StartTransfer {
                admin_id: admin_id.to_string(),
                client_id: node_id.to_string(),
                model_id: delivery.model_id,
                license_key: delivery.license_key,
                blocks: delivery.blocks,
            })
            .await?;
        Ok(self.plane.transfer.run(&session_id).await?)
    }
}
