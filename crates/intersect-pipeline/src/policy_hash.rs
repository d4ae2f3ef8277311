//! `PolicySnapshotHash` — bound into the envelope at phase 2 so a
//! finance-class write can detect policy drift between approval time and
//! write time.

use intersect_core::CoreResult;
use intersect_intersection::Contract;
use serde::Serialize;

#[derive(Serialize)]
struct PolicySnapshotInput<'a> {
    scopes: &'a [intersect_core::Scope],
    ceilings: &'a [intersect_core::Ceiling],
    approval_policy: &'a intersect_core::ApprovalPolicy,
    allowed_payees: &'a [String],
    allowed_recipient_patterns: &'a [String],
}

/// Canonical SHA-256 over the contract's scope set, ceilings,
/// approval-policy body, and (when present) financial visibility
/// policy's payee/pattern allowlists.
pub fn policy_snapshot_hash(contract: &Contract) -> CoreResult<String> {
    let (allowed_payees, allowed_recipient_patterns) = match &contract.financial_visibility_policy {
        Some(p) => (p.allowed_payees.as_slice(), p.allowed_recipient_patterns.as_slice()),
        None => (&[][..], &[][..]),
    };
    intersect_core::hash_of(&PolicySnapshotInput {
        scopes: &contract.scopes,
        ceilings: &contract.ceilings,
        approval_policy: &contract.approval_policy,
        allowed_payees,
        allowed_recipient_patterns,
    })
}
