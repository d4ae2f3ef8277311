use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum ConnectorError {
    #[error("connector {provider} does not support operation {operation}")]
    UnsupportedOperation { provider: String, operation: String },

    #[error("envelope failed connector-side validation: {reason}")]
    EnvelopeInvalid { reason: String },

    #[error("write failed at provider {provider}: {message}")]
    WriteFailed { provider: String, message: String },

    #[error("compensating operation failed at provider {provider}: {message}")]
    CompensationFailed { provider: String, message: String },

    #[error("no receipt on file to compensate for external id {external_id}")]
    ReceiptNotFound { external_id: String },
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;
