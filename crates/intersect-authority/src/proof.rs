//! `AuthorizationProof` and the ceiling evaluation record.

use chrono::{DateTime, Utc};
use intersect_core::{ActionId, IntersectionId, ProofId, TraceId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeCheck {
    pub mode: String,
    pub allowed: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CeilingCheck {
    pub ceiling_description: String,
    pub passed: bool,
    pub reason: Option<String>,
}

/// The authority engine's verdict for one action — authorized or denied,
/// with reason and evidence. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationProof {
    pub id: ProofId,
    pub action_id: ActionId,
    pub intersection_id: IntersectionId,
    pub contract_version: String,
    pub scopes_used: Vec<String>,
    pub scopes_granted: Vec<String>,
    pub mode_check: ModeCheck,
    pub ceiling_checks: Vec<CeilingCheck>,
    pub authorized: bool,
    pub denial_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub evaluated_at: DateTime<Utc>,
    pub trace_id: TraceId,
    pub approved_by_human: bool,
    pub approval_artifact: String,
}
