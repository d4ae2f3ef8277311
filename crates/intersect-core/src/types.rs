//! Shared domain types from `spec.md` §3 that more than one crate needs:
//! scopes, ceilings, policies, run modes, actions, and settlement status.
//! Entity-owning types (intersections, contracts, proofs, artifacts,
//! envelopes, audit entries) live in the crate that owns them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::identifiers::CircleId;

/// `RunMode` — only `Execute` may cause external writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    SuggestOnly,
    Simulate,
    Execute,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::SuggestOnly => "suggest_only",
            RunMode::Simulate => "simulate",
            RunMode::Execute => "execute",
        }
    }
}

/// `read_write` axis of a `Scope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadWrite {
    Read,
    Write,
    Execute,
    Delegate,
}

impl ReadWrite {
    /// Whether this axis denotes a write scope (`:write` or `:execute` suffix).
    pub fn is_write(&self) -> bool {
        matches!(self, ReadWrite::Write | ReadWrite::Execute)
    }
}

/// A named capability in a contract, e.g. `calendar:write`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub name: String,
    pub read_write: ReadWrite,
}

impl Scope {
    pub fn new(name: impl Into<String>, read_write: ReadWrite) -> Self {
        Self {
            name: name.into(),
            read_write,
        }
    }

    pub fn is_write(&self) -> bool {
        self.read_write.is_write()
    }

    /// Render as the wire form a caller passes around, e.g. `calendar:write`.
    pub fn qualified_name(&self) -> String {
        let suffix = match self.read_write {
            ReadWrite::Read => "read",
            ReadWrite::Write => "write",
            ReadWrite::Execute => "execute",
            ReadWrite::Delegate => "delegate",
        };
        format!("{}:{}", self.name, suffix)
    }
}

/// Typed constraint attached to a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Ceiling {
    /// `HH:MM-HH:MM` daily window.
    TimeWindow { value: String },
    /// Integer duration with a unit, e.g. `{value: 60, unit: "minutes"}`.
    Duration { value: i64, unit: String },
    /// Integer max-events-per-period limit.
    MaxEvents { value: i64, unit: String },
    /// Anything the engine doesn't recognize — passes by default, recorded
    /// as unknown in the proof.
    #[serde(other)]
    Unknown,
}

/// `ApprovalPolicy` — single mode is the default and is equivalent to
/// `threshold = 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    #[serde(default)]
    pub mode: ApprovalMode,
    #[serde(default)]
    pub required_approvers: Vec<CircleId>,
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default = "default_expiry_seconds")]
    pub expiry_seconds: u64,
    #[serde(default)]
    pub applies_to_scopes: Vec<String>,
}

fn default_threshold() -> u32 {
    1
}

fn default_expiry_seconds() -> u64 {
    3600
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            mode: ApprovalMode::Single,
            required_approvers: Vec::new(),
            threshold: default_threshold(),
            total: 0,
            expiry_seconds: default_expiry_seconds(),
            applies_to_scopes: Vec::new(),
        }
    }
}

impl ApprovalPolicy {
    /// `total` is derived from `threshold` when the contract left it zero.
    pub fn effective_total(&self) -> u32 {
        if self.total == 0 {
            self.threshold
        } else {
            self.total
        }
    }

    /// Whether this policy governs `scope` — an empty `applies_to_scopes`
    /// means "all write scopes".
    pub fn applies_to(&self, scope_name: &str) -> bool {
        self.applies_to_scopes.is_empty() || self.applies_to_scopes.iter().any(|s| s == scope_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    #[default]
    Single,
    Multi,
}

/// Governance rules for an intersection: who must approve an amendment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Governance {
    #[serde(default)]
    pub amendment_requires: AmendmentRequires,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AmendmentRequires {
    #[default]
    AllParties,
    Initiator,
    Majority,
}

/// Governs symmetric shared-view generation for finance writes; not on
/// the write path itself, but its hash participates in
/// `PolicySnapshotHash` for finance-class actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FinancialVisibilityPolicy {
    #[serde(default)]
    pub allowed_payees: Vec<String>,
    #[serde(default)]
    pub allowed_recipient_patterns: Vec<String>,
    #[serde(default)]
    pub symmetric_view: bool,
}

/// An opaque requested external side effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub intersection_id: String,
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl Action {
    pub fn parameters_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.parameters).unwrap_or(serde_json::Value::Null)
    }
}

/// `SettlementStatus` — terminal states are `Settled`, `Aborted`,
/// `Revoked`, `BlockedApproval`; `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Settled,
    Aborted,
    Revoked,
    BlockedApproval,
}

impl SettlementStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SettlementStatus::Pending)
    }
}
