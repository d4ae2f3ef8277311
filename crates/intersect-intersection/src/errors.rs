use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum IntersectionError {
    #[error("intersection not found: {id}")]
    NotFound { id: String },

    #[error("contract not found for intersection: {id}")]
    ContractNotFound { id: String },

    #[error("circle {circle_id} is not a party to intersection {intersection_id}")]
    NotAParty {
        circle_id: String,
        intersection_id: String,
    },

    #[error("invalid version bump: {message}")]
    InvalidVersionBump { message: String },

    #[error("conflicting amendment already in flight for intersection {id}")]
    ConflictingAmendmentInFlight { id: String },

    #[error("intersection {id} is dissolved and cannot be amended")]
    Dissolved { id: String },

    #[error("invitation not found: {id}")]
    InvitationNotFound { id: String },

    #[error("invitation {id} has expired")]
    InvitationExpired { id: String },

    #[error("invitation {id} was already accepted")]
    InvitationAlreadyAccepted { id: String },

    #[error("intersection {id} is not open for new parties in state {state:?}")]
    NotJoinable {
        id: String,
        state: crate::model::IntersectionState,
    },

    #[error("insufficient approvals to apply amendment to intersection {id}")]
    AmendmentNotApproved { id: String },
}

pub type IntersectionResult<T> = Result<T, IntersectionError>;
