//! The approval subsystem: request, submit, verify, sweep.

use crate::artifact::{artifact_key, ApprovalArtifact, ArtifactKey};
use crate::errors::{ApprovalError, ApprovalResult};
use crate::token::{decode_token, encode_token, ApprovalRequestToken};
use chrono::{DateTime, Utc};
use intersect_audit::{event_type, AuditLog, NewAuditEntry};
use intersect_core::{
    Action, ApprovalPolicy, ArtifactId, CircleId, Clock, IntersectionId, Signer, TokenId,
};
use intersect_intersection::Contract;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// The outcome of checking a contract's approval policy against a set of
/// submitted artifacts for one action.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub passed: bool,
    pub threshold_required: u32,
    pub threshold_met: u32,
    pub valid_approvers: Vec<CircleId>,
    pub missing_required_approvers: Vec<CircleId>,
    pub reason: Option<String>,
}

struct State {
    tokens: HashMap<TokenId, ApprovalRequestToken>,
    artifacts: HashMap<ArtifactKey, ApprovalArtifact>,
    by_action: HashMap<(IntersectionId, String), Vec<ArtifactKey>>,
}

pub struct ApprovalSubsystem {
    signer: Arc<dyn Signer>,
    clock: Arc<dyn Clock>,
    audit: Arc<AuditLog>,
    state: RwLock<State>,
}

impl ApprovalSubsystem {
    pub fn new(signer: Arc<dyn Signer>, clock: Arc<dyn Clock>, audit: Arc<AuditLog>) -> Self {
        Self {
            signer,
            clock,
            audit,
            state: RwLock::new(State {
                tokens: HashMap::new(),
                artifacts: HashMap::new(),
                by_action: HashMap::new(),
            }),
        }
    }

    /// Mint a signed request token an approver can later submit back.
    #[allow(clippy::too_many_arguments)]
    pub fn request_approval(
        &self,
        intersection_id: IntersectionId,
        contract_version: String,
        action: &Action,
        action_hash: String,
        action_summary: impl Into<String>,
        requesting_circle_id: CircleId,
        scopes_required: Vec<String>,
        expiry_seconds: u64,
    ) -> ApprovalResult<(ApprovalRequestToken, String)> {
        let now = self.clock.now();
        let mut token = ApprovalRequestToken {
            token_id: TokenId::new(),
            intersection_id: intersection_id.clone(),
            contract_version,
            action_id: intersect_core::ActionId::new(action.id.clone()),
            action_hash,
            action_type: action.action_type.clone(),
            action_summary: action_summary.into(),
            requesting_circle_id,
            scopes_required,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(expiry_seconds as i64),
            signature: Vec::new(),
        };
        token.signature = intersect_core::sign_value(self.signer.as_ref(), &token.signable_payload())
            .map_err(|_| ApprovalError::MalformedToken)?;

        self.audit.append(
            NewAuditEntry::new(
                event_type::APPROVAL_REQUESTED,
                token.action_id.to_string(),
                "requested",
            )
            .with_intersection(intersection_id)
            .with_subject(token.action_id.to_string()),
        );

        let wire = encode_token(&token)?;
        self.state.write().tokens.insert(token.token_id.clone(), token.clone());
        tracing::debug!(
            token_id = %token.token_id,
            action_id = %token.action_id,
            "approval requested"
        );
        Ok((token, wire))
    }

    /// Validate and record one approver's signed response to a request
    /// token, per the five-step sequence: decode, verify signature, check
    /// expiry, check approver authorization, reject duplicates.
    pub fn submit_approval(
        &self,
        encoded_token: &str,
        approver_circle_id: CircleId,
        contract: &Contract,
    ) -> ApprovalResult<ApprovalArtifact> {
        let token = decode_token(encoded_token)?;

        intersect_core::verify_value(self.signer.as_ref(), &token.signable_payload(), &token.signature)
            .map_err(|_| ApprovalError::InvalidSignature)?;

        let now = self.clock.now();
        if token.is_expired(now) {
            return Err(ApprovalError::RequestTokenExpired {
                expired_at: token.expires_at.to_rfc3339(),
            });
        }

        let is_required = contract.approval_policy.required_approvers.is_empty()
            || contract
                .approval_policy
                .required_approvers
                .contains(&approver_circle_id);
        if !contract.is_party(&approver_circle_id) || !is_required {
            self.audit.append(
                NewAuditEntry::new(
                    event_type::APPROVAL_VERIFICATION_FAILED,
                    token.action_id.to_string(),
                    "circle_not_authorized",
                )
                .with_circle(approver_circle_id.clone())
                .with_intersection(token.intersection_id.clone()),
            );
            return Err(ApprovalError::CircleNotAuthorized {
                circle_id: approver_circle_id.to_string(),
            });
        }

        let artifact = ApprovalArtifact {
            id: ArtifactId::new(),
            intersection_id: token.intersection_id.clone(),
            contract_version: token.contract_version.clone(),
            action_id: token.action_id.clone(),
            action_hash: token.action_hash.clone(),
            approver_circle_id: approver_circle_id.clone(),
            scopes_approved: token.scopes_required.clone(),
            approved_at: now,
            expires_at: token.expires_at,
            signature: Vec::new(),
        };
        let key = artifact_key(&artifact);

        {
            let mut state = self.state.write();
            if state.artifacts.contains_key(&key) {
                drop(state);
                self.audit.append(
                    NewAuditEntry::new(
                        event_type::APPROVAL_VERIFICATION_FAILED,
                        token.action_id.to_string(),
                        "duplicate_approval",
                    )
                    .with_circle(approver_circle_id.clone())
                    .with_intersection(token.intersection_id.clone()),
                );
                return Err(ApprovalError::DuplicateApproval {
                    circle_id: approver_circle_id.to_string(),
                });
            }

            let mut artifact = artifact;
            artifact.signature =
                intersect_core::sign_value(self.signer.as_ref(), &artifact.signable())
                    .map_err(|_| ApprovalError::MalformedToken)?;

            state.artifacts.insert(key.clone(), artifact.clone());
            state
                .by_action
                .entry((token.intersection_id.clone(), token.action_id.to_string()))
                .or_default()
                .push(key);

            self.audit.append(
                NewAuditEntry::new(
                    event_type::APPROVAL_SUBMITTED,
                    token.action_id.to_string(),
                    "submitted",
                )
                .with_circle(approver_circle_id.clone())
                .with_intersection(token.intersection_id.clone()),
            );
            tracing::debug!(
                action_id = %token.action_id,
                approver = %approver_circle_id,
                "approval submitted"
            );
            Ok(artifact)
        }
    }

    /// Whether `scopes_used` is governed by `policy` at all — an empty
    /// `applies_to_scopes` governs every write scope.
    fn policy_applies(policy: &ApprovalPolicy, scopes_used: &[String]) -> bool {
        policy.applies_to_scopes.is_empty()
            || scopes_used.iter().any(|s| policy.applies_to(s))
    }

    /// Check a contract's approval policy against submitted artifacts for
    /// one action. Single-mode (or a policy that doesn't govern any of
    /// `scopes_used`) is satisfied by any one valid artifact.
    pub fn verify_approvals(
        &self,
        contract: &Contract,
        intersection_id: &IntersectionId,
        action_id: &str,
        action_hash: &str,
        scopes_used: &[String],
    ) -> VerificationResult {
        let now = self.clock.now();
        let state = self.state.read();
        let keys = state
            .by_action
            .get(&(intersection_id.clone(), action_id.to_string()))
            .cloned()
            .unwrap_or_default();

        let mut valid_approvers = Vec::new();
        for key in &keys {
            let Some(artifact) = state.artifacts.get(key) else { continue };
            if artifact.is_expired(now) {
                continue;
            }
            if artifact.action_hash != action_hash {
                continue;
            }
            if intersect_core::verify_value(self.signer.as_ref(), &artifact.signable(), &artifact.signature).is_err() {
                continue;
            }
            valid_approvers.push(artifact.approver_circle_id.clone());
        }
        drop(state);

        let policy = &contract.approval_policy;
        if !Self::policy_applies(policy, scopes_used) {
            let result = VerificationResult {
                passed: !valid_approvers.is_empty() || matches!(policy.mode, intersect_core::ApprovalMode::Single),
                threshold_required: 1,
                threshold_met: valid_approvers.len().min(1) as u32,
                valid_approvers,
                missing_required_approvers: Vec::new(),
                reason: Some("scope not governed by this approval policy".to_string()),
            };
            self.audit_verification(intersection_id, action_id, &result, policy.mode);
            return result;
        }

        let result = match policy.mode {
            // Single mode is satisfied by the human-approval flag alone, not
            // a submitted artifact — it always passes.
            intersect_core::ApprovalMode::Single => VerificationResult {
                passed: true,
                threshold_required: 1,
                threshold_met: 1,
                valid_approvers,
                missing_required_approvers: Vec::new(),
                reason: None,
            },
            intersect_core::ApprovalMode::Multi => {
                let required: Vec<CircleId> = policy
                    .required_approvers
                    .iter()
                    .filter(|c| !valid_approvers.contains(c))
                    .cloned()
                    .collect();
                let threshold_met = valid_approvers.len() as u32;
                let threshold_required = policy.effective_total();
                let passed = threshold_met >= threshold_required && required.is_empty();
                VerificationResult {
                    passed,
                    threshold_required,
                    threshold_met,
                    valid_approvers,
                    missing_required_approvers: required,
                    reason: if passed {
                        None
                    } else {
                        Some(format!(
                            "{threshold_met}/{threshold_required} approvals, required approvers outstanding: {:?}",
                            policy.required_approvers
                        ))
                    },
                }
            }
        };
        self.audit_verification(intersection_id, action_id, &result, policy.mode);
        result
    }

    fn audit_verification(
        &self,
        intersection_id: &IntersectionId,
        action_id: &str,
        result: &VerificationResult,
        mode: intersect_core::ApprovalMode,
    ) {
        let event_type = if result.passed {
            event_type::APPROVAL_VERIFIED
        } else {
            event_type::APPROVAL_VERIFICATION_FAILED
        };
        self.audit.append(
            NewAuditEntry::new(event_type, action_id, if result.passed { "verified" } else { "insufficient" })
                .with_intersection(intersection_id.clone())
                .with_subject(action_id)
                .with_metadata("threshold_met", serde_json::json!(result.threshold_met))
                .with_metadata("threshold_required", serde_json::json!(result.threshold_required)),
        );
        self.audit.append(
            NewAuditEntry::new(
                event_type::APPROVAL_POLICY_CHECKED,
                action_id,
                if result.passed { "passed" } else { "failed" },
            )
            .with_intersection(intersection_id.clone())
            .with_subject(action_id)
            .with_metadata("mode", serde_json::json!(mode))
            .with_metadata("passed", serde_json::json!(result.passed)),
        );
    }

    /// Sweep artifacts and tokens whose expiry is strictly before `now`,
    /// returning the count removed.
    pub fn delete_expired(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.write();
        let expired_tokens: Vec<TokenId> = state
            .tokens
            .iter()
            .filter(|(_, t)| t.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired_tokens {
            state.tokens.remove(id);
        }

        let expired_keys: Vec<ArtifactKey> = state
            .artifacts
            .iter()
            .filter(|(_, a)| a.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired_keys {
            if let Some(artifact) = state.artifacts.remove(key) {
                self.audit.append(
                    NewAuditEntry::new(event_type::APPROVAL_EXPIRED, artifact.action_id.to_string(), "expired")
                        .with_intersection(artifact.intersection_id.clone()),
                );
            }
        }
        for entries in state.by_action.values_mut() {
            entries.retain(|k| !expired_keys.contains(k));
        }
        expired_tokens.len() + expired_keys.len()
    }
}
