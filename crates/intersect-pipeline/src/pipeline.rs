//! The two-phase execution pipeline — `spec.md` §4.I, the largest and
//! most load-bearing component: it is the only place that calls a
//! connector, and the only place that decides `SettlementStatus`.

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, PipelineResult};
use crate::policy_hash::policy_snapshot_hash;
use crate::request::{PipelineRequest, PipelineResponse};
use intersect_audit::{event_type, AuditFilter, AuditLog, NewAuditEntry};
use intersect_authority::AuthorityEngine;
use intersect_connector::ExecutionEnvelope;
use intersect_core::{ActionId, Clock, RunMode, SettlementStatus};
use intersect_intersection::IntersectionStore;
use intersect_revocation::RevocationRegistry;
use std::sync::Arc;

pub struct ExecutionPipeline {
    authority: Arc<AuthorityEngine>,
    approvals: Arc<intersect_approval::ApprovalSubsystem>,
    intersections: Arc<IntersectionStore>,
    revocations: Arc<RevocationRegistry>,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl ExecutionPipeline {
    pub fn new(
        authority: Arc<AuthorityEngine>,
        approvals: Arc<intersect_approval::ApprovalSubsystem>,
        intersections: Arc<IntersectionStore>,
        revocations: Arc<RevocationRegistry>,
        audit: Arc<AuditLog>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            authority,
            approvals,
            intersections,
            revocations,
            audit,
            clock,
            config,
        }
    }

    pub async fn execute(&self, req: PipelineRequest) -> PipelineResult<PipelineResponse> {
        self.validate(&req)?;

        let action_id = ActionId::new(req.action.id.clone());

        // Phase 1, step 2 — authorize. The pipeline asserts
        // `approved_by_human = true`: by the time a write reaches phase
        // 1 a human has already approved it (cli flag or an approval
        // artifact); whether that approval is *sufficient* for this
        // contract's policy is decided next, by the approval subsystem.
        let proof = self.authority.authorize(
            &req.action,
            &req.required_scopes,
            RunMode::Execute,
            req.trace_id.clone(),
            true,
            req.approval_artifact.clone(),
        );
        if !proof.authorized {
            let error = format!("authorization denied: {}", proof.denial_reason.clone().unwrap_or_default());
            return Ok(self.finish(
                false,
                SettlementStatus::Pending,
                Some(proof),
                None,
                None,
                None,
                Some(error),
                req.trace_id.as_str(),
                &req.action.id,
            ));
        }

        let contract = self
            .intersections
            .get_contract(&req.intersection_id)
            .map_err(|_| PipelineError::MissingIntersection)?;

        let action_hash = intersect_core::action_hash(
            &req.action.id,
            &req.action.action_type,
            &req.action.parameters_json(),
            req.intersection_id.as_str(),
            &proof.contract_version,
            &req.required_scopes,
            "execute",
        )?;

        // Phase 1, step 3 — multi-party approval.
        let verification = self.approvals.verify_approvals(
            &contract,
            &req.intersection_id,
            &req.action.id,
            &action_hash,
            &req.required_scopes,
        );
        if !verification.passed {
            let error = verification.reason.clone().unwrap_or_else(|| "insufficient approvals".to_string());
            return Ok(self.finish(
                false,
                SettlementStatus::BlockedApproval,
                Some(proof),
                None,
                None,
                None,
                Some(error),
                req.trace_id.as_str(),
                &req.action.id,
            ));
        }

        // Phase 1, step 4 — pre-write revocation check.
        if let Err(revocation_error) = self.revocations.check_before_write(&action_id, &req.intersection_id, &proof.id) {
            self.audit.append(
                NewAuditEntry::new(event_type::REVOCATION_RECEIVED, req.action.id.clone(), "revoked")
                    .with_intersection(req.intersection_id.clone())
                    .with_trace(req.trace_id.clone())
                    .with_metadata("reason", serde_json::json!(revocation_error.to_string())),
            );
            return Ok(self.finish(
                false,
                SettlementStatus::Revoked,
                Some(proof),
                None,
                None,
                None,
                Some(revocation_error.to_string()),
                req.trace_id.as_str(),
                &req.action.id,
            ));
        }

        // Phase 1, step 5.
        self.audit.append(
            NewAuditEntry::new(event_type::ACTION_PENDING, req.action.id.clone(), "pending")
                .with_intersection(req.intersection_id.clone())
                .with_trace(req.trace_id.clone())
                .with_proof(proof.id),
        );

        self.execute_phase_two(req, proof, contract, action_id).await
    }

    async fn execute_phase_two(
        &self,
        req: PipelineRequest,
        proof: intersect_authority::AuthorizationProof,
        contract: intersect_intersection::Contract,
        action_id: ActionId,
    ) -> PipelineResult<PipelineResponse> {
        // Phase 2, step 6 — final revocation check.
        if let Err(revocation_error) = self.revocations.check_before_write(&action_id, &req.intersection_id, &proof.id) {
            self.audit.append(
                NewAuditEntry::new(event_type::REVOCATION_APPLIED, req.action.id.clone(), "revoked")
                    .with_intersection(req.intersection_id.clone())
                    .with_trace(req.trace_id.clone())
                    .with_proof(proof.id)
                    .with_metadata("reason", serde_json::json!(revocation_error.to_string())),
            );
            return Ok(self.finish(
                false,
                SettlementStatus::Revoked,
                Some(proof),
                None,
                None,
                None,
                Some(revocation_error.to_string()),
                req.trace_id.as_str(),
                &req.action.id,
            ));
        }

        if req.cancellation.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // Phase 2, step 7 — build the envelope. `policy_snapshot_hash` is
        // always computed from the current contract; for finance-class
        // writes, with the toggle on, a mismatch against the policy that
        // governed phase 1 aborts before the connector is touched
        // (`spec.md` §4.H's policy drift check).
        let current_contract = self
            .intersections
            .get_contract(&req.intersection_id)
            .map_err(|_| PipelineError::MissingIntersection)?;
        let policy_hash = policy_snapshot_hash(&current_contract)?;
        if self.config.enforce_policy_drift_check && is_finance_class(&req.required_scopes) {
            let authorized_hash = policy_snapshot_hash(&contract)?;
            if authorized_hash != policy_hash {
                self.audit.append(
                    NewAuditEntry::new(event_type::SETTLEMENT_ABORTED, req.action.id.clone(), "aborted")
                        .with_intersection(req.intersection_id.clone())
                        .with_trace(req.trace_id.clone())
                        .with_metadata("reason", serde_json::json!("policy drift detected")),
                );
                return Ok(self.finish(
                    false,
                    SettlementStatus::Aborted,
                    Some(proof),
                    None,
                    None,
                    None,
                    Some("policy drift detected since authorization".to_string()),
                    req.trace_id.as_str(),
                    &req.action.id,
                ));
            }
        }
        let envelope = ExecutionEnvelope {
            trace_id: req.trace_id.clone(),
            mode: RunMode::Execute,
            actor_circle_id: req.actor_circle_id.clone(),
            intersection_id: req.intersection_id.clone(),
            contract_version: proof.contract_version.clone(),
            scopes_used: req.required_scopes.clone(),
            authorization_proof_id: proof.id,
            issued_at: self.clock.now(),
            approved_by_human: true,
            approval_artifact: req.approval_artifact.clone(),
            policy_snapshot_hash: policy_hash,
            view_snapshot_hash: req.view_snapshot_hash.clone(),
            view_captured_at: req.view_captured_at,
        };

        // Phase 2, step 8.
        self.audit.append(
            NewAuditEntry::new(event_type::CONNECTOR_WRITE_ATTEMPTED, req.action.id.clone(), "attempted")
                .with_intersection(req.intersection_id.clone())
                .with_trace(req.trace_id.clone())
                .with_proof(proof.id)
                .with_metadata("operation", serde_json::json!(req.write_request.operation)),
        );

        // Phase 2, step 9.
        let receipt = match req.connector.write(&envelope, &req.write_request).await {
            Ok(receipt) => receipt,
            Err(connector_error) => {
                self.audit.append(
                    NewAuditEntry::new(event_type::CONNECTOR_WRITE_FAILED, req.action.id.clone(), "failed")
                        .with_intersection(req.intersection_id.clone())
                        .with_trace(req.trace_id.clone())
                        .with_metadata("reason", serde_json::json!(connector_error.to_string())),
                );
                self.audit.append(
                    NewAuditEntry::new(event_type::SETTLEMENT_ABORTED, req.action.id.clone(), "aborted")
                        .with_intersection(req.intersection_id.clone())
                        .with_trace(req.trace_id.clone()),
                );
                return Ok(self.finish(
                    false,
                    SettlementStatus::Aborted,
                    Some(proof),
                    None,
                    None,
                    None,
                    Some(connector_error.to_string()),
                    req.trace_id.as_str(),
                    &req.action.id,
                ));
            }
        };

        // Phase 2, step 10.
        self.audit.append(
            NewAuditEntry::new(event_type::CONNECTOR_WRITE_SUCCEEDED, req.action.id.clone(), "succeeded")
                .with_intersection(req.intersection_id.clone())
                .with_trace(req.trace_id.clone())
                .with_metadata("external_id", serde_json::json!(receipt.external_id)),
        );

        // Phase 2, step 11 — post-write revocation check.
        if let Err(revocation_error) = self.revocations.check_before_write(&action_id, &req.intersection_id, &proof.id) {
            self.audit.append(
                NewAuditEntry::new(event_type::ROLLBACK_ATTEMPTED, req.action.id.clone(), "attempted")
                    .with_intersection(req.intersection_id.clone())
                    .with_trace(req.trace_id.clone())
                    .with_metadata("reason", serde_json::json!(revocation_error.to_string())),
            );
            let (rolled_back, rollback_error) = match req.connector.compensate(&envelope, &receipt).await {
                Ok(()) => {
                    self.audit.append(
                        NewAuditEntry::new(event_type::ROLLBACK_SUCCEEDED, req.action.id.clone(), "succeeded")
                            .with_intersection(req.intersection_id.clone())
                            .with_trace(req.trace_id.clone()),
                    );
                    (true, None)
                }
                Err(compensation_error) => {
                    self.audit.append(
                        NewAuditEntry::new(event_type::ROLLBACK_FAILED, req.action.id.clone(), "failed")
                            .with_intersection(req.intersection_id.clone())
                            .with_trace(req.trace_id.clone())
                            .with_metadata("reason", serde_json::json!(compensation_error.to_string())),
                    );
                    (false, Some(compensation_error.to_string()))
                }
            };
            return Ok(self.finish(
                false,
                SettlementStatus::Revoked,
                Some(proof),
                Some(receipt),
                Some(rolled_back),
                rollback_error,
                Some(revocation_error.to_string()),
                req.trace_id.as_str(),
                &req.action.id,
            ));
        }

        // Phase 2, step 12.
        self.audit.append(
            NewAuditEntry::new(event_type::SETTLEMENT_SETTLED, req.action.id.clone(), "settled")
                .with_intersection(req.intersection_id.clone())
                .with_trace(req.trace_id.clone())
                .with_proof(proof.id),
        );

        Ok(self.finish(
            true,
            SettlementStatus::Settled,
            Some(proof),
            Some(receipt),
            None,
            None,
            None,
            req.trace_id.as_str(),
            &req.action.id,
        ))
    }

    fn validate(&self, req: &PipelineRequest) -> PipelineResult<()> {
        if req.trace_id.as_str().is_empty() {
            return Err(PipelineError::MissingTraceId);
        }
        if req.actor_circle_id.as_str().is_empty() {
            return Err(PipelineError::MissingActor);
        }
        if req.intersection_id.as_str().is_empty() {
            return Err(PipelineError::MissingIntersection);
        }
        if req.action.id.is_empty() {
            return Err(PipelineError::MissingAction);
        }
        if req.is_write() && req.approval_artifact.is_empty() {
            return Err(PipelineError::MissingApprovalArtifact);
        }
        if !req.connector.supports_write(&req.write_request.operation) {
            return Err(PipelineError::ConnectorDoesNotSupportWrite {
                operation: req.write_request.operation.clone(),
            });
        }
        if req.cancellation.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        success: bool,
        settlement_status: SettlementStatus,
        proof: Option<intersect_authority::AuthorizationProof>,
        receipt: Option<intersect_connector::WriteReceipt>,
        rolled_back: Option<bool>,
        rollback_error: Option<String>,
        error: Option<String>,
        trace_id: &str,
        action_id: &str,
    ) -> PipelineResponse {
        let trail = self.audit.list(&AuditFilter::default());
        let audit_trail = trail
            .into_iter()
            .filter(|e| e.action == action_id && e.trace_id.as_ref().map(|t| t.as_str()) == Some(trace_id))
            .collect();

        tracing::info!(
            trace_id = %trace_id,
            action_id = %action_id,
            success,
            settlement_status = ?settlement_status,
            "pipeline run finished"
        );

        PipelineResponse {
            success,
            settlement_status,
            mode: RunMode::Execute,
            authorization_proof: proof,
            receipt,
            rolled_back,
            rollback_error,
            audit_trail,
            error,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

fn is_finance_class(required_scopes: &[String]) -> bool {
    required_scopes.iter().any(|s| s.starts_with("finance"))
}
