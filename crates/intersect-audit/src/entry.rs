//! The stored audit event and the draft a caller submits to `append`.

use intersect_core::{ActionId, AuditEntryId, CircleId, IntersectionId, ProofId, TraceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable wire names for the audit event taxonomy (`spec.md` §6).
pub mod event_type {
    pub const ACTION_PENDING: &str = "action.pending";
    pub const AUTHORIZATION_CHECKED: &str = "authorization.checked";
    pub const APPROVAL_REQUESTED: &str = "approval.requested";
    pub const APPROVAL_SUBMITTED: &str = "approval.submitted";
    pub const APPROVAL_EXPIRED: &str = "approval.expired";
    pub const APPROVAL_VERIFIED: &str = "approval.verified";
    pub const APPROVAL_VERIFICATION_FAILED: &str = "approval.verification_failed";
    pub const APPROVAL_POLICY_CHECKED: &str = "approval.policy.checked";
    pub const REVOCATION_RECEIVED: &str = "revocation.received";
    pub const REVOCATION_APPLIED: &str = "revocation.applied";
    pub const CONNECTOR_WRITE_ATTEMPTED: &str = "connector.write.attempted";
    pub const CONNECTOR_WRITE_SUCCEEDED: &str = "connector.write.succeeded";
    pub const CONNECTOR_WRITE_FAILED: &str = "connector.write.failed";
    pub const SETTLEMENT_SETTLED: &str = "settlement.settled";
    pub const SETTLEMENT_ABORTED: &str = "settlement.aborted";
    pub const ROLLBACK_ATTEMPTED: &str = "rollback.attempted";
    pub const ROLLBACK_SUCCEEDED: &str = "rollback.succeeded";
    pub const ROLLBACK_FAILED: &str = "rollback.failed";
}

/// A caller-constructed draft; `AuditLog::append` fills in `id`,
/// `timestamp`, `previous_hash`, and `hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditEntry {
    #[serde(rename = "type")]
    pub event_type: String,
    pub circle_id: Option<CircleId>,
    pub intersection_id: Option<IntersectionId>,
    pub action: String,
    pub outcome: String,
    pub trace_id: Option<TraceId>,
    pub authorization_proof_id: Option<ProofId>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl NewAuditEntry {
    pub fn new(event_type: impl Into<String>, action: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            circle_id: None,
            intersection_id: None,
            action: action.into(),
            outcome: outcome.into(),
            trace_id: None,
            authorization_proof_id: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_circle(mut self, circle_id: CircleId) -> Self {
        self.circle_id = Some(circle_id);
        self
    }

    pub fn with_intersection(mut self, intersection_id: IntersectionId) -> Self {
        self.intersection_id = Some(intersection_id);
        self
    }

    pub fn with_trace(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn with_proof(mut self, proof_id: ProofId) -> Self {
        self.authorization_proof_id = Some(proof_id);
        self
    }

    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.metadata
            .insert("subject_id".to_string(), serde_json::Value::String(subject_id.into()));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A stored, immutable audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub circle_id: Option<CircleId>,
    pub intersection_id: Option<IntersectionId>,
    pub action: String,
    pub outcome: String,
    pub trace_id: Option<TraceId>,
    pub authorization_proof_id: Option<ProofId>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub previous_hash: String,
    pub hash: String,
    pub explanation: Option<String>,
}

impl AuditEntry {
    /// Subject id recorded via `NewAuditEntry::with_subject`, most often
    /// an `ActionId`.
    pub fn subject_id(&self) -> Option<&str> {
        self.metadata.get("subject_id").and_then(|v| v.as_str())
    }

    pub fn subject_action_id(&self) -> Option<ActionId> {
        self.subject_id().map(ActionId::new)
    }
}
