//! End-to-end pipeline scenarios exercising the full prepare/execute
//! sequence across every collaborating crate.

use async_trait::async_trait;
use intersect_approval::ApprovalSubsystem;
use intersect_audit::AuditLog;
use intersect_authority::AuthorityEngine;
use intersect_connector::{
    ConnectorResult, ExecutionEnvelope, MockCalendarConnector, MockFinanceConnector, ProviderInfo,
    WriteConnector, WriteReceipt, WriteRequest,
};
use intersect_core::{
    Action, ActionId, ApprovalMode, ApprovalPolicy, Ceiling, CircleId, Clock, FixedClock,
    HmacSigner, IntersectionId, ReadWrite, Scope, Signer, TraceId,
};
use intersect_intersection::{ContractDraft, IntersectionStore};
use intersect_pipeline::{Cancellation, ExecutionPipeline, PipelineConfig, PipelineRequest};
use intersect_revocation::RevocationRegistry;
use std::sync::Arc;

/// Wraps a finance connector and revokes the action as a side effect of
/// `write()`, so the revocation lands strictly between the write and the
/// pipeline's post-write check — exercising compensation deterministically
/// instead of racing a background signal.
struct RevokeOnWriteConnector {
    inner: MockFinanceConnector,
    revocations: Arc<RevocationRegistry>,
    action_id: ActionId,
}

#[async_trait]
impl WriteConnector for RevokeOnWriteConnector {
    fn provider_info(&self) -> ProviderInfo {
        self.inner.provider_info()
    }
    fn capabilities(&self) -> Vec<String> {
        self.inner.capabilities()
    }
    fn required_scopes(&self) -> Vec<String> {
        self.inner.required_scopes()
    }
    fn supports_write(&self, operation: &str) -> bool {
        self.inner.supports_write(operation)
    }
    async fn write(&self, envelope: &ExecutionEnvelope, request: &WriteRequest) -> ConnectorResult<WriteReceipt> {
        let receipt = self.inner.write(envelope, request).await?;
        self.revocations
            .revoke_action(&self.action_id, "funds frozen mid-flight", CircleId::new("alice"));
        Ok(receipt)
    }
    async fn compensate(&self, envelope: &ExecutionEnvelope, receipt: &WriteReceipt) -> ConnectorResult<()> {
        self.inner.compensate(envelope, receipt).await
    }
}

struct Harness {
    pipeline: ExecutionPipeline,
    intersections: Arc<IntersectionStore>,
    revocations: Arc<RevocationRegistry>,
    approvals: Arc<ApprovalSubsystem>,
    signer: Arc<dyn Signer>,
    clock: Arc<dyn Clock>,
}

fn harness(approval_policy: ApprovalPolicy) -> (Harness, IntersectionId) {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(intersect_core::clock::test_epoch()));
    let revocations = Arc::new(RevocationRegistry::new(clock.clone()));
    let intersections = Arc::new(IntersectionStore::new(clock.clone(), revocations.clone()));
    let audit = Arc::new(AuditLog::new(clock.clone()));
    let authority = Arc::new(AuthorityEngine::new(intersections.clone(), audit.clone(), clock.clone()));
    let signer: Arc<dyn Signer> = Arc::new(HmacSigner::new(b"test-key".to_vec()));
    let approvals = Arc::new(ApprovalSubsystem::new(signer.clone(), clock.clone(), audit.clone()));

    let draft = ContractDraft {
        scopes: vec![
            Scope::new("calendar", ReadWrite::Write),
            Scope::new("finance", ReadWrite::Write),
        ],
        ceilings: vec![Ceiling::MaxEvents { value: 5, unit: "day".to_string() }],
        governance: Default::default(),
        approval_policy,
        financial_visibility_policy: None,
    };
    let (intersection, _contract) = intersections.create("tenant1", CircleId::new("alice"), draft);

    let pipeline = ExecutionPipeline::new(
        authority,
        approvals.clone(),
        intersections.clone(),
        revocations.clone(),
        audit,
        clock.clone(),
        PipelineConfig::default(),
    );

    (
        Harness {
            pipeline,
            intersections,
            revocations,
            approvals,
            signer,
            clock,
        },
        intersection.id,
    )
}

fn calendar_action(intersection_id: &IntersectionId, id: &str) -> Action {
    Action {
        id: id.to_string(),
        intersection_id: intersection_id.as_str().to_string(),
        action_type: "calendar.create_event".to_string(),
        parameters: Default::default(),
    }
}

fn finance_action(intersection_id: &IntersectionId, id: &str) -> Action {
    Action {
        id: id.to_string(),
        intersection_id: intersection_id.as_str().to_string(),
        action_type: "finance.create_payment".to_string(),
        parameters: Default::default(),
    }
}

/// Requests an approval token and immediately submits it back as the
/// given approver, returning the encoded artifact expected on the
/// pipeline request.
fn approve(
    h: &Harness,
    intersection_id: &IntersectionId,
    action: &Action,
    scopes: &[String],
    approver: &str,
) -> String {
    let contract = h.intersections.get_contract(intersection_id).unwrap();
    let action_hash = intersect_core::action_hash(
        &action.id,
        &action.action_type,
        &action.parameters_json(),
        intersection_id.as_str(),
        &contract.version,
        scopes,
        "execute",
    )
    .unwrap();

    let (_token, wire) = h
        .approvals
        .request_approval(
            intersection_id.clone(),
            contract.version.clone(),
            action,
            action_hash,
            "test action",
            CircleId::new("alice"),
            scopes.to_vec(),
            3600,
        )
        .unwrap();

    h.approvals
        .submit_approval(&wire, CircleId::new(approver), &contract)
        .unwrap();
    wire
}

#[tokio::test]
async fn single_approval_settles() {
    let (h, intersection_id) = harness(ApprovalPolicy::default());
    let action = calendar_action(&intersection_id, "a1");
    let scopes = vec!["calendar:write".to_string()];

    let req = PipelineRequest {
        trace_id: TraceId::new("trace-1"),
        actor_circle_id: CircleId::new("alice"),
        intersection_id: intersection_id.clone(),
        action,
        required_scopes: scopes,
        approval_artifact: "cli:--approve".to_string(),
        write_request: WriteRequest::new("create_event"),
        connector: Arc::new(MockCalendarConnector::default()),
        view_snapshot_hash: "view-hash".to_string(),
        view_captured_at: h.clock.now(),
        cancellation: Cancellation::new(),
    };

    let response = h.pipeline.execute(req).await.unwrap();
    assert!(response.success);
    assert_eq!(response.settlement_status, intersect_core::SettlementStatus::Settled);
    assert!(response.receipt.is_some());
    assert!(!response.audit_trail.is_empty());
}

#[tokio::test]
async fn multi_approval_insufficient_blocks() {
    let mut policy = ApprovalPolicy::default();
    policy.mode = ApprovalMode::Multi;
    policy.required_approvers = vec![CircleId::new("bob"), CircleId::new("carol")];
    policy.threshold = 2;
    let (h, intersection_id) = harness(policy);

    let action = calendar_action(&intersection_id, "a2");
    let scopes = vec!["calendar:write".to_string()];

    let req = PipelineRequest {
        trace_id: TraceId::new("trace-2"),
        actor_circle_id: CircleId::new("alice"),
        intersection_id: intersection_id.clone(),
        action,
        required_scopes: scopes,
        approval_artifact: "cli:--approve".to_string(),
        write_request: WriteRequest::new("create_event"),
        connector: Arc::new(MockCalendarConnector::default()),
        view_snapshot_hash: "view-hash".to_string(),
        view_captured_at: h.clock.now(),
        cancellation: Cancellation::new(),
    };

    let response = h.pipeline.execute(req).await.unwrap();
    assert!(!response.success);
    assert_eq!(response.settlement_status, intersect_core::SettlementStatus::BlockedApproval);
}

#[tokio::test]
async fn missing_scope_denies_before_approval_check() {
    let (h, intersection_id) = harness(ApprovalPolicy::default());
    let action = calendar_action(&intersection_id, "a3");
    let scopes = vec!["video:write".to_string()];

    let req = PipelineRequest {
        trace_id: TraceId::new("trace-3"),
        actor_circle_id: CircleId::new("alice"),
        intersection_id: intersection_id.clone(),
        action,
        required_scopes: scopes,
        approval_artifact: "cli:--approve".to_string(),
        write_request: WriteRequest::new("create_event"),
        connector: Arc::new(MockCalendarConnector::default()),
        view_snapshot_hash: "view-hash".to_string(),
        view_captured_at: h.clock.now(),
        cancellation: Cancellation::new(),
    };

    let response = h.pipeline.execute(req).await.unwrap();
    assert!(!response.success);
    assert!(response.error.as_deref().unwrap_or("").contains("missing scopes"));
}

#[tokio::test]
async fn ceiling_exceeded_denies() {
    let (h, intersection_id) = harness(ApprovalPolicy::default());
    let mut action = calendar_action(&intersection_id, "a4");
    action
        .parameters
        .insert("event_count".to_string(), serde_json::json!(10));
    let scopes = vec!["calendar:write".to_string()];
    let artifact = approve(&h, &intersection_id, &action, &scopes, "alice");

    let req = PipelineRequest {
        trace_id: TraceId::new("trace-4"),
        actor_circle_id: CircleId::new("alice"),
        intersection_id: intersection_id.clone(),
        action,
        required_scopes: scopes,
        approval_artifact: artifact,
        write_request: WriteRequest::new("create_event"),
        connector: Arc::new(MockCalendarConnector::default()),
        view_snapshot_hash: "view-hash".to_string(),
        view_captured_at: h.clock.now(),
        cancellation: Cancellation::new(),
    };

    let response = h.pipeline.execute(req).await.unwrap();
    assert!(!response.success);
    assert!(response.error.as_deref().unwrap_or("").contains("ceiling exceeded"));
    assert!(response.receipt.is_none());
}

#[tokio::test]
async fn pre_write_revocation_blocks() {
    let (h, intersection_id) = harness(ApprovalPolicy::default());
    let action = calendar_action(&intersection_id, "a5");
    let scopes = vec!["calendar:write".to_string()];
    let artifact = approve(&h, &intersection_id, &action, &scopes, "alice");

    h.revocations.revoke_action(
        &intersect_core::ActionId::new("a5"),
        "caller cancelled",
        CircleId::new("alice"),
    );

    let req = PipelineRequest {
        trace_id: TraceId::new("trace-5"),
        actor_circle_id: CircleId::new("alice"),
        intersection_id: intersection_id.clone(),
        action,
        required_scopes: scopes,
        approval_artifact: artifact,
        write_request: WriteRequest::new("create_event"),
        connector: Arc::new(MockCalendarConnector::default()),
        view_snapshot_hash: "view-hash".to_string(),
        view_captured_at: h.clock.now(),
        cancellation: Cancellation::new(),
    };

    let response = h.pipeline.execute(req).await.unwrap();
    assert!(!response.success);
    assert_eq!(response.settlement_status, intersect_core::SettlementStatus::Revoked);
    assert!(response.receipt.is_none());
}

#[tokio::test]
async fn post_write_revocation_triggers_compensation() {
    let (h, intersection_id) = harness(ApprovalPolicy::default());
    let action = finance_action(&intersection_id, "a6");
    let scopes = vec!["finance:write".to_string()];
    let artifact = approve(&h, &intersection_id, &action, &scopes, "alice");

    let connector = Arc::new(RevokeOnWriteConnector {
        inner: MockFinanceConnector::default(),
        revocations: h.revocations.clone(),
        action_id: ActionId::new("a6"),
    });

    let req = PipelineRequest {
        trace_id: TraceId::new("trace-6"),
        actor_circle_id: CircleId::new("alice"),
        intersection_id: intersection_id.clone(),
        action,
        required_scopes: scopes,
        approval_artifact: artifact,
        write_request: WriteRequest::new("create_payment"),
        connector: connector.clone(),
        view_snapshot_hash: "view-hash".to_string(),
        view_captured_at: h.clock.now(),
        cancellation: Cancellation::new(),
    };

    let response = h.pipeline.execute(req).await.unwrap();
    assert!(!response.success);
    assert_eq!(response.settlement_status, intersect_core::SettlementStatus::Revoked);
    assert_eq!(response.rolled_back, Some(true));
    assert!(response.receipt.is_some());
    let _ = h.signer;
}

#[tokio::test]
async fn multi_approval_satisfied_settles() {
    let mut policy = ApprovalPolicy::default();
    policy.mode = ApprovalMode::Multi;
    policy.required_approvers = vec![CircleId::new("bob"), CircleId::new("carol")];
    policy.threshold = 2;
    let (h, intersection_id) = harness(policy);

    for approver in ["bob", "carol"] {
        let invitation = h
            .intersections
            .create_invitation(
                &intersection_id,
                CircleId::new("alice"),
                Some(CircleId::new(approver)),
                vec!["calendar:write".to_string()],
                3600,
            )
            .unwrap();
        h.intersections
            .accept_invitation(&invitation.id, CircleId::new(approver))
            .unwrap();
    }

    let action = calendar_action(&intersection_id, "a7");
    let scopes = vec!["calendar:write".to_string()];
    let contract = h.intersections.get_contract(&intersection_id).unwrap();
    let action_hash = intersect_core::action_hash(
        &action.id,
        &action.action_type,
        &action.parameters_json(),
        intersection_id.as_str(),
        &contract.version,
        &scopes,
        "execute",
    )
    .unwrap();
    let (_token, wire) = h
        .approvals
        .request_approval(
            intersection_id.clone(),
            contract.version.clone(),
            &action,
            action_hash,
            "two-party approval",
            CircleId::new("alice"),
            scopes.clone(),
            3600,
        )
        .unwrap();
    let contract = h.intersections.get_contract(&intersection_id).unwrap();
    h.approvals.submit_approval(&wire, CircleId::new("bob"), &contract).unwrap();
    h.approvals.submit_approval(&wire, CircleId::new("carol"), &contract).unwrap();

    let req = PipelineRequest {
        trace_id: TraceId::new("trace-7"),
        actor_circle_id: CircleId::new("alice"),
        intersection_id: intersection_id.clone(),
        action,
        required_scopes: scopes,
        approval_artifact: wire,
        write_request: WriteRequest::new("create_event"),
        connector: Arc::new(MockCalendarConnector::default()),
        view_snapshot_hash: "view-hash".to_string(),
        view_captured_at: h.clock.now(),
        cancellation: Cancellation::new(),
    };

    let response = h.pipeline.execute(req).await.unwrap();
    assert!(response.success);
    assert_eq!(response.settlement_status, intersect_core::SettlementStatus::Settled);
}

#[tokio::test]
async fn policy_not_governing_scope_behaves_like_single() {
    let mut policy = ApprovalPolicy::default();
    policy.applies_to_scopes = vec!["email:write".to_string()];
    let (h, intersection_id) = harness(policy);

    let action = calendar_action(&intersection_id, "a8");
    let scopes = vec!["calendar:write".to_string()];
    let artifact = approve(&h, &intersection_id, &action, &scopes, "alice");

    let req = PipelineRequest {
        trace_id: TraceId::new("trace-8"),
        actor_circle_id: CircleId::new("alice"),
        intersection_id: intersection_id.clone(),
        action,
        required_scopes: scopes,
        approval_artifact: artifact,
        write_request: WriteRequest::new("create_event"),
        connector: Arc::new(MockCalendarConnector::default()),
        view_snapshot_hash: "view-hash".to_string(),
        view_captured_at: h.clock.now(),
        cancellation: Cancellation::new(),
    };

    let response = h.pipeline.execute(req).await.unwrap();
    assert!(response.success);
    assert_eq!(response.settlement_status, intersect_core::SettlementStatus::Settled);
}
