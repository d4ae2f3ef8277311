use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum AuthorityError {
    #[error("proof not found: {id}")]
    ProofNotFound { id: String },

    #[error("no proofs recorded for action: {action_id}")]
    NoProofForAction { action_id: String },
}

pub type AuthorityResult<T> = Result<T, AuthorityError>;
