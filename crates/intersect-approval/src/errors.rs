use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire names mirror `spec.md` §7's denial-reason taxonomy for this
/// component.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum ApprovalError {
    #[error("malformed approval request token")]
    MalformedToken,

    #[error("request token expired at {expired_at}")]
    RequestTokenExpired { expired_at: String },

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("circle {circle_id} is not authorized to approve this action")]
    CircleNotAuthorized { circle_id: String },

    #[error("circle {circle_id} already submitted an approval for this action")]
    DuplicateApproval { circle_id: String },

    #[error("approval request token not found: {token_id}")]
    TokenNotFound { token_id: String },

    #[error("action hash mismatch: token was issued for a different action state")]
    ActionHashMismatch,
}

pub type ApprovalResult<T> = Result<T, ApprovalError>;
