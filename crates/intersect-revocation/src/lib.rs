//! # Intersect Revocation — the revocation registry
//!
//! Maps `target_id -> latest signal`, last write wins (`spec.md` §4.C).
//! `check_before_write` is the mandatory pre-write call the pipeline
//! invokes both before and immediately after the connector write.

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use intersect_core::{ActionId, Clock, CircleId, IntersectionId, ProofId, RevocationId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationType {
    AuthorityRevoked,
    IntersectionDissolved,
    CircleSuspended,
    ActionCancelled,
    CircleRevoked,
}

/// What kind of entity `target_id` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Action,
    Intersection,
    Grant,
    Circle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationSignal {
    pub id: RevocationId,
    pub signal_type: RevocationType,
    pub target_id: String,
    pub target_type: TargetType,
    pub revoked_at: DateTime<Utc>,
    pub revoked_by: CircleId,
    pub reason: String,
}

/// Error raised by `check_before_write` — distinguishable by signal type
/// per `spec.md` §7.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum RevocationError {
    #[error("action revoked: {reason}")]
    ActionRevoked { reason: String },
    #[error("authority revoked: {reason}")]
    AuthorityRevoked { reason: String },
    #[error("intersection dissolved: {reason}")]
    IntersectionDissolved { reason: String },
    #[error("circle suspended: {reason}")]
    CircleSuspended { reason: String },
    #[error("circle revoked: {reason}")]
    CircleRevoked { reason: String },
}

impl RevocationError {
    fn from_signal(signal: &RevocationSignal) -> Self {
        let reason = signal.reason.clone();
        match signal.signal_type {
            RevocationType::ActionCancelled => RevocationError::ActionRevoked { reason },
            RevocationType::AuthorityRevoked => RevocationError::AuthorityRevoked { reason },
            RevocationType::IntersectionDissolved => RevocationError::IntersectionDissolved { reason },
            RevocationType::CircleSuspended => RevocationError::CircleSuspended { reason },
            RevocationType::CircleRevoked => RevocationError::CircleRevoked { reason },
        }
    }
}

pub type RevocationResult<T> = Result<T, RevocationError>;

/// `target_id -> latest signal` registry.
pub struct RevocationRegistry {
    clock: Arc<dyn Clock>,
    signals: RwLock<HashMap<String, RevocationSignal>>,
}

impl RevocationRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            signals: RwLock::new(HashMap::new()),
        }
    }

    /// Upsert a signal; last write wins per target id.
    pub fn revoke(&self, mut signal: RevocationSignal) -> RevocationSignal {
        tracing::info!(
            target_id = %signal.target_id,
            signal_type = ?signal.signal_type,
            "revocation signal recorded"
        );
        let mut signals = self.signals.write();
        signal.revoked_at = self.clock.now();
        signals.insert(signal.target_id.clone(), signal.clone());
        signal
    }

    fn revoke_typed(
        &self,
        signal_type: RevocationType,
        target_type: TargetType,
        target_id: impl Into<String>,
        reason: impl Into<String>,
        by: CircleId,
    ) -> RevocationSignal {
        self.revoke(RevocationSignal {
            id: RevocationId::new(),
            signal_type,
            target_id: target_id.into(),
            target_type,
            revoked_at: self.clock.now(),
            revoked_by: by,
            reason: reason.into(),
        })
    }

    pub fn revoke_action(&self, action_id: &ActionId, reason: impl Into<String>, by: CircleId) -> RevocationSignal {
        self.revoke_typed(
            RevocationType::ActionCancelled,
            TargetType::Action,
            action_id.as_str(),
            reason,
            by,
        )
    }

    pub fn revoke_authority(&self, target_id: impl Into<String>, reason: impl Into<String>, by: CircleId) -> RevocationSignal {
        self.revoke_typed(RevocationType::AuthorityRevoked, TargetType::Grant, target_id, reason, by)
    }

    pub fn revoke_intersection(
        &self,
        intersection_id: &IntersectionId,
        reason: impl Into<String>,
        by: CircleId,
    ) -> RevocationSignal {
        self.revoke_typed(
            RevocationType::IntersectionDissolved,
            TargetType::Intersection,
            intersection_id.as_str(),
            reason,
            by,
        )
    }

    pub fn revoke_circle(&self, circle_id: &CircleId, reason: impl Into<String>, by: CircleId) -> RevocationSignal {
        self.revoke_typed(
            RevocationType::CircleRevoked,
            TargetType::Circle,
            circle_id.as_str(),
            reason,
            by,
        )
    }

    pub fn suspend_circle(&self, circle_id: &CircleId, reason: impl Into<String>, by: CircleId) -> RevocationSignal {
        self.revoke_typed(
            RevocationType::CircleSuspended,
            TargetType::Circle,
            circle_id.as_str(),
            reason,
            by,
        )
    }

    pub fn is_revoked(&self, target_id: &str) -> Option<RevocationSignal> {
        self.signals.read().get(target_id).cloned()
    }

    /// Checks `action_id`, then `intersection_id`, then `proof_id`, in
    /// that order, returning the first match.
    pub fn is_action_revoked(
        &self,
        action_id: &ActionId,
        intersection_id: &IntersectionId,
        proof_id: &ProofId,
    ) -> Option<RevocationSignal> {
        self.is_revoked(action_id.as_str())
            .or_else(|| self.is_revoked(intersection_id.as_str()))
            .or_else(|| self.is_revoked(&proof_id.to_string()))
    }

    /// The mandatory pre-write call. Any applicable signal maps to a
    /// distinguishable typed error.
    pub fn check_before_write(
        &self,
        action_id: &ActionId,
        intersection_id: &IntersectionId,
        proof_id: &ProofId,
    ) -> RevocationResult<()> {
        match self.is_action_revoked(action_id, intersection_id, proof_id) {
            Some(signal) => Err(RevocationError::from_signal(&signal)),
            None => Ok(()),
        }
    }

    /// Testing-only: clear a target's signal so it no longer blocks writes.
    pub fn clear(&self, target_id: &str) {
        self.signals.write().remove(target_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intersect_core::FixedClock;

    fn registry() -> RevocationRegistry {
        RevocationRegistry::new(Arc::new(FixedClock(intersect_core::clock::test_epoch())))
    }

    #[test]
    fn check_before_write_passes_when_clean() {
        let reg = registry();
        let result = reg.check_before_write(
            &ActionId::new("a1"),
            &IntersectionId::new("i1"),
            &ProofId::new(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn revoked_action_blocks_write() {
        let reg = registry();
        let action_id = ActionId::new("a1");
        reg.revoke_action(&action_id, "cancelled", CircleId::new("owner"));
        let result = reg.check_before_write(&action_id, &IntersectionId::new("i1"), &ProofId::new());
        assert!(matches!(result, Err(RevocationError::ActionRevoked { .. })));
    }

    #[test]
    fn last_write_wins_per_target() {
        let reg = registry();
        let action_id = ActionId::new("a1");
        reg.revoke_action(&action_id, "first", CircleId::new("owner"));
        reg.revoke_action(&action_id, "second", CircleId::new("owner"));
        let signal = reg.is_revoked(action_id.as_str()).unwrap();
        assert_eq!(signal.reason, "second");
    }

    #[test]
    fn cleared_signal_no_longer_blocks() {
        let reg = registry();
        let action_id = ActionId::new("a1");
        reg.revoke_action(&action_id, "cancelled", CircleId::new("owner"));
        reg.clear(action_id.as_str());
        let result = reg.check_before_write(&action_id, &IntersectionId::new("i1"), &ProofId::new());
        assert!(result.is_ok());
    }

    #[test]
    fn intersection_dissolution_blocks_any_action_in_it() {
        let reg = registry();
        let intersection_id = IntersectionId::new("i1");
        reg.revoke_intersection(&intersection_id, "dissolved", CircleId::new("owner"));
        let result = reg.check_before_write(&ActionId::new("a1"), &intersection_id, &ProofId::new());
        assert!(matches!(result, Err(RevocationError::IntersectionDissolved { .. })));
    }
}
