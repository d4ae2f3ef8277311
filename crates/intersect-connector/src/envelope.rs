//! `ExecutionEnvelope` — the immutable bundle the pipeline builds at the
//! start of phase 2 and hands to a connector, per `spec.md` §4.H.

use chrono::{DateTime, Utc};
use intersect_core::{CircleId, IntersectionId, ProofId, RunMode, TraceId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEnvelope {
    pub trace_id: TraceId,
    pub mode: RunMode,
    pub actor_circle_id: CircleId,
    pub intersection_id: IntersectionId,
    pub contract_version: String,
    pub scopes_used: Vec<String>,
    pub authorization_proof_id: ProofId,
    pub issued_at: DateTime<Utc>,
    pub approved_by_human: bool,
    pub approval_artifact: String,
    /// Canonical SHA-256 over the policy body in force when this envelope
    /// was built: scopes, ceilings, approval policy, financial visibility
    /// policy. Bound so finance-class writes can detect policy drift.
    pub policy_snapshot_hash: String,
    /// Canonical SHA-256 over the provider-side view captured at approval
    /// time (e.g. email thread id / message count / last-message
    /// timestamp). Re-verified against a live view immediately before
    /// write; a mismatch means the view has gone stale.
    pub view_snapshot_hash: String,
    pub view_captured_at: DateTime<Utc>,
}

impl ExecutionEnvelope {
    pub fn requires_write_scope(&self, scope: &str) -> bool {
        self.scopes_used.iter().any(|s| s == scope)
    }
}
