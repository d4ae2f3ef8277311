//! The append-only log itself.

use crate::entry::{AuditEntry, NewAuditEntry};
use crate::filter::AuditFilter;
use intersect_core::{sha256_hex, AuditEntryId, Clock};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Hash chain root — the `previous_hash` of the first entry ever appended.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum AuditError {
    #[error("audit entry not found: {id}")]
    NotFound { id: String },

    #[error("audit entry {id} already has an explanation attached")]
    ExplanationAlreadyAttached { id: String },
}

pub type AuditResult<T> = Result<T, AuditError>;

struct State {
    entries: Vec<AuditEntry>,
    tail_hash: String,
}

/// Process-wide append-only audit log with a hash-chained tail.
pub struct AuditLog {
    clock: Arc<dyn Clock>,
    state: RwLock<State>,
}

impl AuditLog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: RwLock::new(State {
                entries: Vec::new(),
                tail_hash: GENESIS_HASH.to_string(),
            }),
        }
    }

    /// Append a new entry, computing its id, timestamp, `previous_hash`,
    /// and `hash`. Never fails on validation alone.
    pub fn append(&self, draft: NewAuditEntry) -> AuditEntry {
        let mut state = self.state.write();
        let id = AuditEntryId::new();
        let timestamp = self.clock.now();
        let previous_hash = state.tail_hash.clone();
        let hash = compute_hash(
            &id,
            draft.circle_id.as_ref(),
            &draft.event_type,
            &draft.action,
            &draft.outcome,
            &previous_hash,
        );

        let entry = AuditEntry {
            id,
            timestamp,
            event_type: draft.event_type,
            circle_id: draft.circle_id,
            intersection_id: draft.intersection_id,
            action: draft.action,
            outcome: draft.outcome,
            trace_id: draft.trace_id,
            authorization_proof_id: draft.authorization_proof_id,
            metadata: draft.metadata,
            previous_hash,
            hash: hash.clone(),
            explanation: None,
        };

        tracing::debug!(
            entry_id = %entry.id,
            event_type = %entry.event_type,
            outcome = %entry.outcome,
            "audit entry appended"
        );

        state.entries.push(entry.clone());
        state.tail_hash = hash;
        entry
    }

    pub fn get(&self, id: &AuditEntryId) -> AuditResult<AuditEntry> {
        let state = self.state.read();
        state
            .entries
            .iter()
            .find(|e| &e.id == id)
            .cloned()
            .ok_or_else(|| AuditError::NotFound { id: id.to_string() })
    }

    pub fn list(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        let state = self.state.read();
        let matched: Vec<AuditEntry> = state
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        let start = filter.offset.min(matched.len());
        match filter.limit {
            Some(limit) => matched[start..].iter().take(limit).cloned().collect(),
            None => matched[start..].to_vec(),
        }
    }

    /// Attach a 1:1 optional explanation to an existing entry.
    pub fn attach_explanation(&self, id: &AuditEntryId, explanation: impl Into<String>) -> AuditResult<()> {
        let mut state = self.state.write();
        let entry = state
            .entries
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| AuditError::NotFound { id: id.to_string() })?;
        if entry.explanation.is_some() {
            return Err(AuditError::ExplanationAlreadyAttached { id: id.to_string() });
        }
        entry.explanation = Some(explanation.into());
        Ok(())
    }

    /// Current tail hash — the `previous_hash` the next append will use.
    pub fn tail_hash(&self) -> String {
        self.state.read().tail_hash.clone()
    }

    /// Verify the entire chain from the genesis hash, recomputing each
    /// entry's hash from its fields and comparing against the stored
    /// value (P2). Returns the index of the first broken link, if any.
    pub fn verify_chain(&self) -> Result<(), usize> {
        let state = self.state.read();
        let mut expected_previous = GENESIS_HASH.to_string();
        for (i, entry) in state.entries.iter().enumerate() {
            if entry.previous_hash != expected_previous {
                return Err(i);
            }
            let recomputed = compute_hash(
                &entry.id,
                entry.circle_id.as_ref(),
                &entry.event_type,
                &entry.action,
                &entry.outcome,
                &entry.previous_hash,
            );
            if recomputed != entry.hash {
                return Err(i);
            }
            expected_previous = entry.hash.clone();
        }
        Ok(())
    }
}

fn compute_hash(
    id: &AuditEntryId,
    circle_id: Option<&intersect_core::CircleId>,
    event_type: &str,
    action: &str,
    outcome: &str,
    previous_hash: &str,
) -> String {
    let joined = format!(
        "{}|{}|{}|{}|{}|{}",
        id,
        circle_id.map(|c| c.as_str()).unwrap_or(""),
        event_type,
        action,
        outcome,
        previous_hash
    );
    sha256_hex(joined.as_bytes())
}
