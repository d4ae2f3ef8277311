//! The `WriteConnector` capability interface — the pipeline's adapter
//! boundary, per `spec.md` §4.G.

use crate::envelope::ExecutionEnvelope;
use crate::errors::{ConnectorError, ConnectorResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
}

/// An opaque, domain-specific write request. `operation` names the verb
/// (`create_event`, `send_email`, `create_payment`, …); `parameters`
/// carries whatever that verb needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    pub operation: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl WriteRequest {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// What a successful write returns: an external id the connector can
/// later use to compensate, plus whatever provider-specific detail is
/// worth recording in the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub external_id: String,
    pub provider: String,
    pub operation: String,
    pub raw: serde_json::Value,
}

/// Capability interface every external write target implements. The
/// pipeline never matches on connector identity — it only calls through
/// this trait.
#[async_trait]
pub trait WriteConnector: Send + Sync {
    fn provider_info(&self) -> ProviderInfo;
    fn capabilities(&self) -> Vec<String>;
    fn required_scopes(&self) -> Vec<String>;
    fn supports_write(&self, operation: &str) -> bool;

    /// Perform the write. Implementations must validate the envelope
    /// themselves — `mode == execute`, `approved_by_human`, and the
    /// operation's scope present in `scopes_used` — before touching the
    /// external system.
    async fn write(
        &self,
        envelope: &ExecutionEnvelope,
        request: &WriteRequest,
    ) -> ConnectorResult<WriteReceipt>;

    /// The compensating inverse of `write` (`delete_event`,
    /// `abort_payment`, …), used by rollback on post-write revocation.
    async fn compensate(
        &self,
        envelope: &ExecutionEnvelope,
        receipt: &WriteReceipt,
    ) -> ConnectorResult<()>;
}

/// Shared envelope validation every mock connector runs before writing:
/// `spec.md` §4.G — "Connectors must validate the envelope themselves".
pub fn validate_envelope(envelope: &ExecutionEnvelope, required_scope: &str) -> ConnectorResult<()> {
    if envelope.mode != intersect_core::RunMode::Execute {
        return Err(ConnectorError::EnvelopeInvalid {
            reason: "mode is not execute".to_string(),
        });
    }
    if !envelope.approved_by_human {
        return Err(ConnectorError::EnvelopeInvalid {
            reason: "not approved by a human".to_string(),
        });
    }
    if !envelope.requires_write_scope(required_scope) {
        return Err(ConnectorError::EnvelopeInvalid {
            reason: format!("required scope {required_scope} not present in scopes_used"),
        });
    }
    Ok(())
}
