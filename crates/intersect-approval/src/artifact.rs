//! `ApprovalArtifact` — a signed record that one circle approved one
//! action, keyed uniquely by `(intersection_id, action_id, approver)`.

use chrono::{DateTime, Utc};
use intersect_core::{ActionId, ArtifactId, CircleId, IntersectionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalArtifact {
    pub id: ArtifactId,
    pub intersection_id: IntersectionId,
    pub contract_version: String,
    pub action_id: ActionId,
    pub action_hash: String,
    pub approver_circle_id: CircleId,
    pub scopes_approved: Vec<String>,
    pub approved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(with = "crate::token::hex_bytes")]
    pub signature: Vec<u8>,
}

impl ApprovalArtifact {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn signable(&self) -> SignableArtifact<'_> {
        SignableArtifact {
            id: &self.id,
            intersection_id: &self.intersection_id,
            contract_version: &self.contract_version,
            action_id: &self.action_id,
            action_hash: &self.action_hash,
            approver_circle_id: &self.approver_circle_id,
            scopes_approved: &self.scopes_approved,
            approved_at: self.approved_at,
            expires_at: self.expires_at,
        }
    }
}

#[derive(Serialize)]
pub struct SignableArtifact<'a> {
    id: &'a ArtifactId,
    intersection_id: &'a IntersectionId,
    contract_version: &'a str,
    action_id: &'a ActionId,
    action_hash: &'a str,
    approver_circle_id: &'a CircleId,
    scopes_approved: &'a [String],
    approved_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// A unique key for the at-most-one-artifact-per-approver-per-action
/// invariant.
pub type ArtifactKey = (IntersectionId, ActionId, CircleId);

pub fn artifact_key(artifact: &ApprovalArtifact) -> ArtifactKey {
    (
        artifact.intersection_id.clone(),
        artifact.action_id.clone(),
        artifact.approver_circle_id.clone(),
    )
}
