//! The deterministic authority engine: `spec.md` §4.E.

use crate::ceilings::{evaluate_ceiling, CeilingOutcome};
use crate::errors::{AuthorityError, AuthorityResult};
use crate::proof::{AuthorizationProof, ModeCheck};
use intersect_audit::{event_type, AuditLog, NewAuditEntry};
use intersect_core::{Action, Clock, IntersectionId, ProofId, RunMode, TraceId};
use intersect_intersection::IntersectionStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Whether a qualified scope name (`calendar:write`) denotes a write
/// scope, per the glossary's `:write`/`:execute` suffix convention.
fn is_write_scope_name(name: &str) -> bool {
    name.ends_with(":write") || name.ends_with(":execute")
}

struct ProofStore {
    by_id: HashMap<ProofId, AuthorizationProof>,
    by_action: HashMap<String, Vec<ProofId>>,
}

/// Deterministic policy evaluation: no network, no randomness. Replaying
/// `authorize` with the same inputs yields the same authorized/denied
/// decision and ceiling outcomes (P1).
pub struct AuthorityEngine {
    intersections: Arc<IntersectionStore>,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    proofs: RwLock<ProofStore>,
}

impl AuthorityEngine {
    pub fn new(intersections: Arc<IntersectionStore>, audit: Arc<AuditLog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            intersections,
            audit,
            clock,
            proofs: RwLock::new(ProofStore {
                by_id: HashMap::new(),
                by_action: HashMap::new(),
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn authorize(
        &self,
        action: &Action,
        required_scopes: &[String],
        mode: RunMode,
        trace_id: TraceId,
        approved_by_human: bool,
        approval_artifact: String,
    ) -> AuthorizationProof {
        let now = self.clock.now();
        let all_read_only = required_scopes.iter().all(|s| !is_write_scope_name(s));

        // Step 1 — mode check.
        let mode_allowed = match mode {
            RunMode::SuggestOnly | RunMode::Simulate => true,
            RunMode::Execute => all_read_only || approved_by_human,
        };
        let mode_check = ModeCheck {
            mode: mode.as_str().to_string(),
            allowed: mode_allowed,
            reason: if mode_allowed {
                None
            } else {
                Some(format!(
                    "write scope(s) {:?} require explicit human approval",
                    required_scopes.iter().filter(|s| is_write_scope_name(s)).collect::<Vec<_>>()
                ))
            },
        };
        if !mode_allowed {
            return self.deny(
                action,
                required_scopes,
                String::new(),
                mode_check,
                Vec::new(),
                trace_id,
                approved_by_human,
                approval_artifact,
                mode_check_denial_reason(required_scopes),
                now,
            );
        }

        // Step 2 — intersection & contract lookup.
        let intersection_id = IntersectionId::new(action.intersection_id.clone());
        let contract = match self.intersections.get_contract(&intersection_id) {
            Ok(contract) => contract,
            Err(e) => {
                return self.deny(
                    action,
                    required_scopes,
                    String::new(),
                    mode_check,
                    Vec::new(),
                    trace_id,
                    approved_by_human,
                    approval_artifact,
                    format!("unknown intersection or contract: {e}"),
                    now,
                );
            }
        };

        // Step 3 — scope check.
        let missing: Vec<&String> = required_scopes
            .iter()
            .filter(|s| !contract.has_scope(s))
            .collect();
        if !missing.is_empty() {
            return self.deny(
                action,
                required_scopes,
                contract.version.clone(),
                mode_check,
                Vec::new(),
                trace_id,
                approved_by_human,
                approval_artifact,
                format!("missing scopes: {missing:?}"),
                now,
            );
        }

        // Step 4 — execute-write approval re-check.
        let has_write_scope = required_scopes.iter().any(|s| is_write_scope_name(s));
        if mode == RunMode::Execute && has_write_scope && !approved_by_human {
            return self.deny(
                action,
                required_scopes,
                contract.version.clone(),
                mode_check,
                Vec::new(),
                trace_id,
                approved_by_human,
                approval_artifact,
                "write scope requires explicit human approval".to_string(),
                now,
            );
        }

        // Step 5 — ceiling checks.
        let mut ceiling_checks = Vec::new();
        let mut hard_failure_reason = None;
        for ceiling in &contract.ceilings {
            let (check, outcome) = evaluate_ceiling(ceiling, action, now);
            if let CeilingOutcome::Exceeded = outcome {
                if hard_failure_reason.is_none() {
                    hard_failure_reason = check.reason.clone();
                }
            }
            ceiling_checks.push(check);
        }

        if let Some(reason) = hard_failure_reason {
            return self.deny(
                action,
                required_scopes,
                contract.version.clone(),
                mode_check,
                ceiling_checks,
                trace_id,
                approved_by_human,
                approval_artifact,
                format!("ceiling exceeded: {reason}"),
                now,
            );
        }

        let scopes_granted: Vec<String> = contract.scopes.iter().map(|s| s.qualified_name()).collect();
        let proof = AuthorizationProof {
            id: ProofId::new(),
            action_id: intersect_core::ActionId::new(action.id.clone()),
            intersection_id,
            contract_version: contract.version.clone(),
            scopes_used: required_scopes.to_vec(),
            scopes_granted,
            mode_check,
            ceiling_checks,
            authorized: true,
            denial_reason: None,
            timestamp: now,
            evaluated_at: now,
            trace_id,
            approved_by_human,
            approval_artifact,
        };
        self.store_and_audit(proof)
    }

    #[allow(clippy::too_many_arguments)]
    fn deny(
        &self,
        action: &Action,
        required_scopes: &[String],
        contract_version: String,
        mode_check: ModeCheck,
        ceiling_checks: Vec<crate::proof::CeilingCheck>,
        trace_id: TraceId,
        approved_by_human: bool,
        approval_artifact: String,
        denial_reason: String,
        now: chrono::DateTime<chrono::Utc>,
    ) -> AuthorizationProof {
        let proof = AuthorizationProof {
            id: ProofId::new(),
            action_id: intersect_core::ActionId::new(action.id.clone()),
            intersection_id: IntersectionId::new(action.intersection_id.clone()),
            contract_version,
            scopes_used: required_scopes.to_vec(),
            scopes_granted: Vec::new(),
            mode_check,
            ceiling_checks,
            authorized: false,
            denial_reason: Some(denial_reason),
            timestamp: now,
            evaluated_at: now,
            trace_id,
            approved_by_human,
            approval_artifact,
        };
        self.store_and_audit(proof)
    }

    fn store_and_audit(&self, proof: AuthorizationProof) -> AuthorizationProof {
        tracing::debug!(
            proof_id = %proof.id,
            action_id = %proof.action_id,
            authorized = proof.authorized,
            "authorization evaluated"
        );
        self.audit.append(
            NewAuditEntry::new(
                event_type::AUTHORIZATION_CHECKED,
                proof.action_id.to_string(),
                if proof.authorized { "authorized" } else { "denied" },
            )
            .with_intersection(proof.intersection_id.clone())
            .with_trace(proof.trace_id.clone())
            .with_proof(proof.id)
            .with_subject(proof.action_id.to_string())
            .with_metadata(
                "denial_reason",
                proof
                    .denial_reason
                    .clone()
                    .map(serde_json::Value::String)
                    .unwrap_or(serde_json::Value::Null),
            ),
        );

        let mut store = self.proofs.write();
        store
            .by_action
            .entry(proof.action_id.to_string())
            .or_default()
            .push(proof.id);
        store.by_id.insert(proof.id, proof.clone());
        proof
    }

    pub fn get_proof(&self, id: &ProofId) -> AuthorityResult<AuthorizationProof> {
        self.proofs
            .read()
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| AuthorityError::ProofNotFound { id: id.to_string() })
    }

    pub fn get_proofs_for_action(&self, action_id: &str) -> AuthorityResult<Vec<AuthorizationProof>> {
        let store = self.proofs.read();
        let ids = store
            .by_action
            .get(action_id)
            .ok_or_else(|| AuthorityError::NoProofForAction {
                action_id: action_id.to_string(),
            })?;
        Ok(ids.iter().filter_map(|id| store.by_id.get(id).cloned()).collect())
    }
}

fn mode_check_denial_reason(required_scopes: &[String]) -> String {
    let writes: Vec<&String> = required_scopes.iter().filter(|s| is_write_scope_name(s)).collect();
    format!("write scope {:?} requires explicit human approval", writes)
}
