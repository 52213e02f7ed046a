//! Driving port.

use crate::domain::{AdmissionError, ApprovalDecision, JoinPriority, JoinRequest, SubmitJoinRequest};
use async_trait::async_trait;

/// Join-request workflow as seen by transports and admin tooling.
#[async_trait]
pub trait AdmissionApi: Send + Sync {
    async fn submit(&self, submission: SubmitJoinRequest) -> Result<JoinRequest, AdmissionError>;

    async fn decide(
        &self,
        request_id: &str,
        admin_id: &str,
        approve: bool,
        notes: &str,
    ) -> Result<ApprovalDecision, AdmissionError>;

    fn list(&self, network: Option<&str>, priority: Option<JoinPriority>) -> Vec<JoinRequest>;

    fn cancel(&self, request_id: &str, reason: &str) -> Result<JoinRequest, AdmissionError>;

    fn get(&self, request_id: &str) -> Option<JoinRequest>;
}
