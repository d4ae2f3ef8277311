use std::sync::Arc;

use intersect_audit::AuditLog;
use intersect_core::{
    Action, ApprovalPolicy, Ceiling, CircleId, Clock, FixedClock, ReadWrite, RunMode, Scope,
    TraceId,
};
use intersect_intersection::{ContractDraft, IntersectionStore};
use intersect_authority::AuthorityEngine;
use intersect_revocation::RevocationRegistry;
use std::collections::BTreeMap;

fn engine_with_intersection() -> (AuthorityEngine, String) {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(intersect_core::clock::test_epoch()));
    let revocations = Arc::new(RevocationRegistry::new(clock.clone()));
    let intersections = Arc::new(IntersectionStore::new(clock.clone(), revocations));
    let audit = Arc::new(AuditLog::new(clock.clone()));

    let draft = ContractDraft {
        scopes: vec![Scope::new("calendar", ReadWrite::Write)],
        ceilings: vec![Ceiling::Duration {
            value: 120,
            unit: "minutes".to_string(),
        }],
        governance: Default::default(),
        approval_policy: ApprovalPolicy::default(),
        financial_visibility_policy: None,
    };
    let (intersection, _) = intersections.create("tenant1", CircleId::new("alice"), draft);

    let engine = AuthorityEngine::new(intersections, audit, clock);
    (engine, intersection.id.as_str().to_string())
}

fn action(intersection_id: &str, params: BTreeMap<String, serde_json::Value>) -> Action {
    Action {
        id: "a1".to_string(),
        intersection_id: intersection_id.to_string(),
        action_type: "calendar.create_event".to_string(),
        parameters: params,
    }
}

#[test]
fn execute_with_write_scope_denied_without_human_approval() {
    let (engine, intersection_id) = engine_with_intersection();
    let proof = engine.authorize(
        &action(&intersection_id, BTreeMap::new()),
        &["calendar:write".to_string()],
        RunMode::Execute,
        TraceId::new("t1"),
        false,
        String::new(),
    );
    assert!(!proof.authorized);
    assert!(proof.denial_reason.unwrap().contains("human approval"));
}

#[test]
fn execute_with_write_scope_and_approval_is_authorized() {
    let (engine, intersection_id) = engine_with_intersection();
    let proof = engine.authorize(
        &action(&intersection_id, BTreeMap::new()),
        &["calendar:write".to_string()],
        RunMode::Execute,
        TraceId::new("t1"),
        true,
        "cli:--approve".to_string(),
    );
    assert!(proof.authorized);
    assert_eq!(proof.contract_version, "1.0.0");
}

#[test]
fn missing_scope_is_denied() {
    let (engine, intersection_id) = engine_with_intersection();
    let proof = engine.authorize(
        &action(&intersection_id, BTreeMap::new()),
        &["email:write".to_string()],
        RunMode::Execute,
        TraceId::new("t1"),
        true,
        "cli:--approve".to_string(),
    );
    assert!(!proof.authorized);
    assert!(proof.denial_reason.unwrap().contains("missing scopes"));
}

#[test]
fn ceiling_over_limit_denies_authorization() {
    let (engine, intersection_id) = engine_with_intersection();
    let mut params = BTreeMap::new();
    params.insert("duration".to_string(), serde_json::json!(999));
    let proof = engine.authorize(
        &action(&intersection_id, params),
        &["calendar:write".to_string()],
        RunMode::Execute,
        TraceId::new("t1"),
        true,
        "cli:--approve".to_string(),
    );
    assert!(!proof.authorized);
    assert!(proof.denial_reason.unwrap().contains("ceiling exceeded"));
}

#[test]
fn suggest_only_never_requires_approval() {
    let (engine, intersection_id) = engine_with_intersection();
    let proof = engine.authorize(
        &action(&intersection_id, BTreeMap::new()),
        &["calendar:write".to_string()],
        RunMode::SuggestOnly,
        TraceId::new("t1"),
        false,
        String::new(),
    );
    assert!(proof.authorized);
}

#[test]
fn authorize_is_deterministic_for_same_inputs() {
    let (engine, intersection_id) = engine_with_intersection();
    let a = action(&intersection_id, BTreeMap::new());
    let p1 = engine.authorize(
        &a,
        &["calendar:write".to_string()],
        RunMode::Execute,
        TraceId::new("t1"),
        true,
        "x".to_string(),
    );
    let p2 = engine.authorize(
        &a,
        &["calendar:write".to_string()],
        RunMode::Execute,
        TraceId::new("t1"),
        true,
        "x".to_string(),
    );
    assert_eq!(p1.authorized, p2.authorized);
    assert_eq!(p1.denial_reason, p2.denial_reason);
}

#[test]
fn proof_retrievable_by_id_and_action_id() {
    let (engine, intersection_id) = engine_with_intersection();
    let proof = engine.authorize(
        &action(&intersection_id, BTreeMap::new()),
        &["calendar:write".to_string()],
        RunMode::Execute,
        TraceId::new("t1"),
        true,
        "x".to_string(),
    );
    assert!(engine.get_proof(&proof.id).is_ok());
    assert_eq!(engine.get_proofs_for_action("a1").unwrap().len(), 1);
}
