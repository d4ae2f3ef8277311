use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors are fatal and reported before any side effect or
/// audit entry — `spec.md` §7's propagation policy.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum PipelineError {
    #[error("missing trace id")]
    MissingTraceId,
    #[error("missing actor circle id")]
    MissingActor,
    #[error("missing intersection id")]
    MissingIntersection,
    #[error("missing action")]
    MissingAction,
    #[error("a write scope in execute mode requires a non-empty approval artifact")]
    MissingApprovalArtifact,
    #[error("connector does not support operation {operation}")]
    ConnectorDoesNotSupportWrite { operation: String },
    #[error("execution cancelled before any write")]
    Cancelled,
    #[error("revocation: {0}")]
    Revocation(#[from] intersect_revocation::RevocationError),
    #[error("connector: {0}")]
    Connector(#[from] intersect_connector::ConnectorError),
    #[error("hashing: {0}")]
    Hashing(#[from] intersect_core::CoreError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
