//! Intersection, contract, party, and invitation value types.

use chrono::{DateTime, Utc};
use intersect_core::{
    ApprovalPolicy, Ceiling, CircleId, FinancialVisibilityPolicy, Governance, IntersectionId,
    InvitationId, Scope,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntersectionState {
    Proposed,
    Negotiating,
    Active,
    Amending,
    Dissolved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intersection {
    pub id: IntersectionId,
    pub tenant_id: String,
    pub state: IntersectionState,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyType {
    Initiator,
    Acceptor,
    Observer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub circle_id: CircleId,
    pub party_type: PartyType,
    pub joined_at: DateTime<Utc>,
    pub granted_scopes: Vec<String>,
}

/// The versioned body of an intersection. Immutable once published;
/// every historical version is retrievable via
/// `IntersectionStore::get_contract_history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub intersection_id: IntersectionId,
    pub version: String,
    pub previous_version: Option<String>,
    pub parties: Vec<Party>,
    pub scopes: Vec<Scope>,
    pub ceilings: Vec<Ceiling>,
    pub governance: Governance,
    pub approval_policy: ApprovalPolicy,
    pub financial_visibility_policy: Option<FinancialVisibilityPolicy>,
    pub published_at: DateTime<Utc>,
}

impl Contract {
    pub fn has_scope(&self, scope_name: &str) -> bool {
        self.scopes.iter().any(|s| s.qualified_name() == scope_name || s.name == scope_name)
    }

    pub fn is_party(&self, circle_id: &CircleId) -> bool {
        self.parties.iter().any(|p| &p.circle_id == circle_id)
    }
}

/// A draft of contract fields a proposer submits for either the initial
/// contract or an amendment.
#[derive(Debug, Clone, Default)]
pub struct ContractDraft {
    pub scopes: Vec<Scope>,
    pub ceilings: Vec<Ceiling>,
    pub governance: Governance,
    pub approval_policy: ApprovalPolicy,
    pub financial_visibility_policy: Option<FinancialVisibilityPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub intersection_id: IntersectionId,
    pub inviting_circle_id: CircleId,
    pub invited_circle_id: Option<CircleId>,
    pub proposed_scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted_at.is_some()
    }
}
