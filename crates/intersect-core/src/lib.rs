//! # Intersect Core — Foundation
//!
//! Single source of truth for identifiers, canonical encoding, hashing,
//! signing, the injected clock, and the handful of domain types shared by
//! every component crate (scopes, ceilings, policies, run modes, actions,
//! settlement status). Component-owning types — intersections, contracts,
//! proofs, artifacts, envelopes, audit entries — live in the crate that
//! owns them, per `spec.md` §9 ("cyclic references → arena + ids").
//!
//! This crate has zero dependencies on any other crate in the workspace.

#![forbid(unsafe_code)]

pub mod canonical;
pub mod clock;
pub mod errors;
pub mod hashing;
pub mod identifiers;
pub mod signing;
pub mod types;

pub use canonical::canonical;
pub use clock::{Clock, FixedClock, StepClock, SystemClock};
pub use errors::{CoreError, CoreResult};
pub use hashing::{action_hash, hash_of, sha256_hex};
pub use identifiers::{
    ActionId, ArtifactId, AuditEntryId, CircleId, IntersectionId, InvitationId, ProofId,
    RevocationId, TokenId, TraceId,
};
pub use signing::{sign_value, verify_value, HmacSigner, Signer};
pub use types::{
    Action, AmendmentRequires, ApprovalMode, ApprovalPolicy, Ceiling, FinancialVisibilityPolicy,
    Governance, ReadWrite, RunMode, Scope, SettlementStatus,
};
