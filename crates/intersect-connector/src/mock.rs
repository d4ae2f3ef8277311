//! In-memory mock connectors for calendar, email, and finance writes —
//! for tests and local development, per `spec.md`'s explicit note that
//! connector internals are an external collaborator.

use crate::connector::{validate_envelope, ProviderInfo, WriteConnector, WriteReceipt, WriteRequest};
use crate::envelope::ExecutionEnvelope;
use crate::errors::{ConnectorError, ConnectorResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// A calendar connector backing `calendar:write`. `create_event` always
/// succeeds; `delete_event` fails if the external id is unknown.
pub struct MockCalendarConnector {
    events: Mutex<HashMap<String, serde_json::Value>>,
    fail_create: bool,
}

impl Default for MockCalendarConnector {
    fn default() -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
            fail_create: false,
        }
    }
}

impl MockCalendarConnector {
    /// A connector whose `create_event` always fails, for exercising the
    /// `write_failed` → `aborted` path in tests.
    pub fn always_failing() -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
            fail_create: true,
        }
    }
}

#[async_trait]
impl WriteConnector for MockCalendarConnector {
    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "mock-calendar".to_string(),
            name: "Mock Calendar".to_string(),
        }
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["create_event".to_string(), "delete_event".to_string()]
    }

    fn required_scopes(&self) -> Vec<String> {
        vec!["calendar:write".to_string()]
    }

    fn supports_write(&self, operation: &str) -> bool {
        operation == "create_event"
    }

    async fn write(&self, envelope: &ExecutionEnvelope, request: &WriteRequest) -> ConnectorResult<WriteReceipt> {
        validate_envelope(envelope, "calendar:write")?;
        if request.operation != "create_event" {
            return Err(ConnectorError::UnsupportedOperation {
                provider: "mock-calendar".to_string(),
                operation: request.operation.clone(),
            });
        }
        if self.fail_create {
            return Err(ConnectorError::WriteFailed {
                provider: "mock-calendar".to_string(),
                message: "simulated provider outage".to_string(),
            });
        }
        let external_id = format!("evt-{}", uuid::Uuid::new_v4());
        let raw = serde_json::json!({ "external_event_id": external_id, "parameters": request.parameters });
        self.events.lock().insert(external_id.clone(), raw.clone());
        Ok(WriteReceipt {
            external_id,
            provider: "mock-calendar".to_string(),
            operation: "create_event".to_string(),
            raw,
        })
    }

    async fn compensate(&self, envelope: &ExecutionEnvelope, receipt: &WriteReceipt) -> ConnectorResult<()> {
        validate_envelope(envelope, "calendar:write").ok();
        let mut events = self.events.lock();
        if events.remove(&receipt.external_id).is_none() {
            return Err(ConnectorError::ReceiptNotFound {
                external_id: receipt.external_id.clone(),
            });
        }
        Ok(())
    }
}

/// An email connector backing `email:write`. Sending is irreversible —
/// `compensate` is unsupported, matching real provider behavior.
#[derive(Default)]
pub struct MockEmailConnector;

#[async_trait]
impl WriteConnector for MockEmailConnector {
    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "mock-email".to_string(),
            name: "Mock Email".to_string(),
        }
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["send_email".to_string()]
    }

    fn required_scopes(&self) -> Vec<String> {
        vec!["email:write".to_string()]
    }

    fn supports_write(&self, operation: &str) -> bool {
        operation == "send_email"
    }

    async fn write(&self, envelope: &ExecutionEnvelope, request: &WriteRequest) -> ConnectorResult<WriteReceipt> {
        validate_envelope(envelope, "email:write")?;
        if request.operation != "send_email" {
            return Err(ConnectorError::UnsupportedOperation {
                provider: "mock-email".to_string(),
                operation: request.operation.clone(),
            });
        }
        let external_id = format!("msg-{}", uuid::Uuid::new_v4());
        Ok(WriteReceipt {
            external_id: external_id.clone(),
            provider: "mock-email".to_string(),
            operation: "send_email".to_string(),
            raw: serde_json::json!({ "external_message_id": external_id }),
        })
    }

    async fn compensate(&self, _envelope: &ExecutionEnvelope, receipt: &WriteReceipt) -> ConnectorResult<()> {
        Err(ConnectorError::CompensationFailed {
            provider: "mock-email".to_string(),
            message: format!("sent message {} cannot be unsent", receipt.external_id),
        })
    }
}

/// A finance connector backing `finance:write`. `create_payment` /
/// `abort_payment` round-trip through an in-memory ledger.
#[derive(Default)]
pub struct MockFinanceConnector {
    payments: Mutex<HashMap<String, serde_json::Value>>,
}

#[async_trait]
impl WriteConnector for MockFinanceConnector {
    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "mock-finance".to_string(),
            name: "Mock Finance".to_string(),
        }
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["create_payment".to_string(), "abort_payment".to_string()]
    }

    fn required_scopes(&self) -> Vec<String> {
        vec!["finance:write".to_string()]
    }

    fn supports_write(&self, operation: &str) -> bool {
        operation == "create_payment"
    }

    async fn write(&self, envelope: &ExecutionEnvelope, request: &WriteRequest) -> ConnectorResult<WriteReceipt> {
        validate_envelope(envelope, "finance:write")?;
        if request.operation != "create_payment" {
            return Err(ConnectorError::UnsupportedOperation {
                provider: "mock-finance".to_string(),
                operation: request.operation.clone(),
            });
        }
        let external_id = format!("pay-{}", uuid::Uuid::new_v4());
        let raw = serde_json::json!({ "external_payment_id": external_id, "parameters": request.parameters });
        self.payments.lock().insert(external_id.clone(), raw.clone());
        Ok(WriteReceipt {
            external_id,
            provider: "mock-finance".to_string(),
            operation: "create_payment".to_string(),
            raw,
        })
    }

    async fn compensate(&self, envelope: &ExecutionEnvelope, receipt: &WriteReceipt) -> ConnectorResult<()> {
        validate_envelope(envelope, "finance:write").ok();
        let mut payments = self.payments.lock();
        if payments.remove(&receipt.external_id).is_none() {
            return Err(ConnectorError::ReceiptNotFound {
                external_id: receipt.external_id.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intersect_core::{CircleId, IntersectionId, ProofId, RunMode, TraceId};

    fn envelope(scope: &str) -> ExecutionEnvelope {
        let now = intersect_core::clock::test_epoch();
        ExecutionEnvelope {
            trace_id: TraceId::new("t1"),
            mode: RunMode::Execute,
            actor_circle_id: CircleId::new("alice"),
            intersection_id: IntersectionId::new("i1"),
            contract_version: "1.0.0".to_string(),
            scopes_used: vec![scope.to_string()],
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
    async fn calendar_write_then_compensate_round_trips() {
        let connector = MockCalendarConnector::default();
        let env = envelope("calendar:write");
        let receipt = connector.write(&env, &WriteRequest::new("create_event")).await.unwrap();
        assert!(!receipt.external_id.is_empty());
        connector.compensate(&env, &receipt).await.unwrap();
        let result = connector.compensate(&env, &receipt).await;
        assert!(matches!(result, Err(ConnectorError::ReceiptNotFound { .. })));
    }

    #[tokio::test]
    async fn calendar_write_rejects_envelope_without_human_approval() {
        let connector = MockCalendarConnector::default();
        let mut env = envelope("calendar:write");
        env.approved_by_human = false;
        let result = connector.write(&env, &WriteRequest::new("create_event")).await;
        assert!(matches!(result, Err(ConnectorError::EnvelopeInvalid { .. })));
    }

    #[tokio::test]
    async fn failing_connector_reports_write_failed() {
        let connector = MockCalendarConnector::always_failing();
        let env = envelope("calendar:write");
        let result = connector.write(&env, &WriteRequest::new("create_event")).await;
        assert!(matches!(result, Err(ConnectorError::WriteFailed { .. })));
    }

    #[tokio::test]
    async fn email_compensation_is_unsupported() {
        let connector = MockEmailConnector;
        let env = envelope("email:write");
        let receipt = connector.write(&env, &WriteRequest::new("send_email")).await.unwrap();
        let result = connector.compensate(&env, &receipt).await;
        assert!(matches!(result, Err(ConnectorError::CompensationFailed { .. })));
    }
}
