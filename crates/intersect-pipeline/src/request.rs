//! `PipelineRequest` / `PipelineResponse` — the shape of
//! `pipeline.execute(req)` from `spec.md` §6.

use crate::cancellation::Cancellation;
use chrono::{DateTime, Utc};
use intersect_audit::AuditEntry;
use intersect_authority::AuthorizationProof;
use intersect_connector::{WriteConnector, WriteReceipt, WriteRequest};
use intersect_core::{Action, CircleId, IntersectionId, RunMode, SettlementStatus, TraceId};
use std::sync::Arc;

pub struct PipelineRequest {
    pub trace_id: TraceId,
    pub actor_circle_id: CircleId,
    pub intersection_id: IntersectionId,
    pub action: Action,
    pub required_scopes: Vec<String>,
    pub approval_artifact: String,
    pub write_request: WriteRequest,
    pub connector: Arc<dyn WriteConnector>,
    /// Captured at approval time by the caller; re-verified conceptually
    /// against a live view before write (the pipeline itself treats it as
    /// opaque — view-provider re-verification is an external
    /// collaborator's responsibility per `spec.md` §1).
    pub view_snapshot_hash: String,
    pub view_captured_at: DateTime<Utc>,
    pub cancellation: Cancellation,
}

impl PipelineRequest {
    pub fn is_write(&self) -> bool {
        self.required_scopes
            .iter()
            .any(|s| s.ends_with(":write") || s.ends_with(":execute"))
    }
}

#[derive(Debug, Clone)]
pub struct PipelineResponse {
    pub success: bool,
    pub settlement_status: SettlementStatus,
    pub mode: RunMode,
    pub authorization_proof: Option<AuthorizationProof>,
    pub receipt: Option<WriteReceipt>,
    pub rolled_back: Option<bool>,
    pub rollback_error: Option<String>,
    pub audit_trail: Vec<AuditEntry>,
    pub error: Option<String>,
}

impl PipelineResponse {
    pub(crate) fn terminal(
        settlement_status: SettlementStatus,
        error: impl Into<String>,
        proof: Option<AuthorizationProof>,
        audit_trail: Vec<AuditEntry>,
    ) -> Self {
        Self {
            success: false,
            settlement_status,
            mode: RunMode::Execute,
            authorization_proof: proof,
            receipt: None,
            rolled_back: None,
            rollback_error: None,
            audit_trail,
            error: Some(error.into()),
        }
    }
}
