use std::sync::Arc;

use intersect_connector::{ExecutionEnvelope, MockCalendarConnector, WriteConnector, WriteRequest};
use intersect_core::{CircleId, IntersectionId, ProofId, RunMode, TraceId};

fn envelope() -> ExecutionEnvelope {
    let now = intersect_core::clock::test_epoch();
    ExecutionEnvelope {
        trace_id: TraceId::new("t1"),
        mode: RunMode::Execute,
        actor_circle_id: CircleId::new("alice"),
        intersection_id: IntersectionId::new("i1"),
        contract_version: "1.0.0".to_string(),
        scopes_used: vec!["calendar:write".to_string()],
        authorization_proof_id: ProofId::new(),
        issued_at: now,
        approved_by_human: true,
        approval_artifact: "cli:--approve".to_string(),
        policy_snapshot_hash: "ph".to_string(),
        view_snapshot_hash: "vh".to_string(),
        view_captured_at: now,
    }
}

#[tokio::test]
async fn pipeline_style_caller_only_sees_the_trait_object() {
    let connector: Arc<dyn WriteConnector> = Arc::new(MockCalendarConnector::default());
    assert!(connector.supports_write("create_event"));
    assert_eq!(connector.required_scopes(), vec!["calendar:write".to_string()]);

    let receipt = connector
        .write(&envelope(), &WriteRequest::new("create_event"))
        .await
        .unwrap();
    assert!(receipt.external_id.starts_with("evt-"));
}
