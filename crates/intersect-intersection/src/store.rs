//! The intersection/contract store: `spec.md` §4.D.

use crate::amendment::{classify_amendment, VersionBump};
use crate::errors::{IntersectionError, IntersectionResult};
use crate::model::{
    Contract, ContractDraft, Intersection, IntersectionState, Invitation, Party, PartyType,
};
use chrono::Duration as ChronoDuration;
use intersect_core::{AmendmentRequires, CircleId, Clock, IntersectionId, InvitationId};
use intersect_revocation::RevocationRegistry;
use parking_lot::RwLock;
use semver::Version;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

struct State {
    intersections: HashMap<IntersectionId, Intersection>,
    /// History in publication order; last element is current.
    contracts: HashMap<IntersectionId, Vec<Contract>>,
    invitations: HashMap<InvitationId, Invitation>,
    pending_amendments: HashMap<IntersectionId, (CircleId, ContractDraft)>,
}

pub struct IntersectionStore {
    clock: Arc<dyn Clock>,
    revocations: Arc<RevocationRegistry>,
    state: RwLock<State>,
}

impl IntersectionStore {
    pub fn new(clock: Arc<dyn Clock>, revocations: Arc<RevocationRegistry>) -> Self {
        Self {
            clock,
            revocations,
            state: RwLock::new(State {
                intersections: HashMap::new(),
                contracts: HashMap::new(),
                invitations: HashMap::new(),
                pending_amendments: HashMap::new(),
            }),
        }
    }

    /// Create a new intersection with an initial `1.0.0` contract.
    pub fn create(
        &self,
        tenant_id: impl Into<String>,
        initiator: CircleId,
        draft: ContractDraft,
    ) -> (Intersection, Contract) {
        let now = self.clock.now();
        let id = IntersectionId::new(uuid::Uuid::new_v4().to_string());
        let intersection = Intersection {
            id: id.clone(),
            tenant_id: tenant_id.into(),
            state: IntersectionState::Proposed,
            version: "1.0.0".to_string(),
            created_at: now,
            updated_at: now,
        };
        let contract = Contract {
            intersection_id: id.clone(),
            version: "1.0.0".to_string(),
            previous_version: None,
            parties: vec![Party {
                circle_id: initiator,
                party_type: PartyType::Initiator,
                joined_at: now,
                granted_scopes: draft.scopes.iter().map(|s| s.qualified_name()).collect(),
            }],
            scopes: draft.scopes,
            ceilings: draft.ceilings,
            governance: draft.governance,
            approval_policy: draft.approval_policy,
            financial_visibility_policy: draft.financial_visibility_policy,
            published_at: now,
        };

        let mut state = self.state.write();
        state.intersections.insert(id.clone(), intersection.clone());
        state.contracts.insert(id, vec![contract.clone()]);
        (intersection, contract)
    }

    pub fn get(&self, id: &IntersectionId) -> IntersectionResult<Intersection> {
        self.state
            .read()
            .intersections
            .get(id)
            .cloned()
            .ok_or_else(|| IntersectionError::NotFound { id: id.to_string() })
    }

    pub fn get_contract(&self, id: &IntersectionId) -> IntersectionResult<Contract> {
        self.state
            .read()
            .contracts
            .get(id)
            .and_then(|history| history.last())
            .cloned()
            .ok_or_else(|| IntersectionError::ContractNotFound { id: id.to_string() })
    }

    pub fn get_contract_history(&self, id: &IntersectionId) -> IntersectionResult<Vec<Contract>> {
        self.state
            .read()
            .contracts
            .get(id)
            .cloned()
            .ok_or_else(|| IntersectionError::ContractNotFound { id: id.to_string() })
    }

    pub fn list_parties(&self, id: &IntersectionId) -> IntersectionResult<Vec<Party>> {
        Ok(self.get_contract(id)?.parties)
    }

    pub fn is_party(&self, id: &IntersectionId, circle_id: &CircleId) -> IntersectionResult<bool> {
        Ok(self.get_contract(id)?.is_party(circle_id))
    }

    /// Propose an amendment. The proposer must be a current party; only
    /// one amendment may be in flight per intersection at a time.
    pub fn propose_amendment(
        &self,
        id: &IntersectionId,
        proposer: CircleId,
        draft: ContractDraft,
    ) -> IntersectionResult<()> {
        let mut state = self.state.write();
        let intersection = state
            .intersections
            .get(id)
            .ok_or_else(|| IntersectionError::NotFound { id: id.to_string() })?;
        if intersection.state == IntersectionState::Dissolved {
            return Err(IntersectionError::Dissolved { id: id.to_string() });
        }
        let current = state
            .contracts
            .get(id)
            .and_then(|h| h.last())
            .ok_or_else(|| IntersectionError::ContractNotFound { id: id.to_string() })?;
        if !current.is_party(&proposer) {
            return Err(IntersectionError::NotAParty {
                circle_id: proposer.to_string(),
                intersection_id: id.to_string(),
            });
        }
        if state.pending_amendments.contains_key(id) {
            return Err(IntersectionError::ConflictingAmendmentInFlight { id: id.to_string() });
        }
        state.pending_amendments.insert(id.clone(), (proposer, draft));
        if let Some(intersection) = state.intersections.get_mut(id) {
            intersection.state = IntersectionState::Amending;
            intersection.updated_at = self.clock.now();
        }
        Ok(())
    }

    /// Apply a previously proposed amendment once `approving_parties`
    /// satisfies the contract's `governance.amendment_requires`.
    pub fn apply_amendment(
        &self,
        id: &IntersectionId,
        approving_parties: &HashSet<CircleId>,
    ) -> IntersectionResult<Contract> {
        let mut state = self.state.write();
        let (proposer, draft) = state
            .pending_amendments
            .get(id)
            .cloned()
            .ok_or_else(|| IntersectionError::ContractNotFound { id: id.to_string() })?;

        let current = state
            .contracts
            .get(id)
            .and_then(|h| h.last())
            .cloned()
            .ok_or_else(|| IntersectionError::ContractNotFound { id: id.to_string() })?;

        let required_satisfied = match current.governance.amendment_requires {
            AmendmentRequires::AllParties => current
                .parties
                .iter()
                .all(|p| approving_parties.contains(&p.circle_id)),
            AmendmentRequires::Initiator => approving_parties.contains(&proposer)
                || current
                    .parties
                    .iter()
                    .any(|p| p.party_type == PartyType::Initiator && approving_parties.contains(&p.circle_id)),
            AmendmentRequires::Majority => {
                let approved = current
                    .parties
                    .iter()
                    .filter(|p| approving_parties.contains(&p.circle_id))
                    .count();
                approved * 2 > current.parties.len()
            }
        };
        if !required_satisfied {
            return Err(IntersectionError::AmendmentNotApproved { id: id.to_string() });
        }

        let bump = classify_amendment(&current, &draft);
        let new_version = bump_version(&current.version, bump)?;
        let now = self.clock.now();

        let new_contract = Contract {
            intersection_id: id.clone(),
            version: new_version.clone(),
            previous_version: Some(current.version.clone()),
            parties: current.parties.clone(),
            scopes: draft.scopes,
            ceilings: draft.ceilings,
            governance: draft.governance,
            approval_policy: draft.approval_policy,
            financial_visibility_policy: draft.financial_visibility_policy,
            published_at: now,
        };

        state
            .contracts
            .get_mut(id)
            .expect("contract history exists")
            .push(new_contract.clone());
        state.pending_amendments.remove(id);
        if let Some(intersection) = state.intersections.get_mut(id) {
            intersection.version = new_version;
            intersection.state = IntersectionState::Active;
            intersection.updated_at = now;
        }

        tracing::debug!(
            intersection_id = %id,
            version = %new_contract.version,
            bump = ?bump,
            "amendment applied"
        );
        Ok(new_contract)
    }

    pub fn cancel_amendment(&self, id: &IntersectionId) {
        let mut state = self.state.write();
        state.pending_amendments.remove(id);
        if let Some(intersection) = state.intersections.get_mut(id) {
            if intersection.state == IntersectionState::Amending {
                intersection.state = IntersectionState::Active;
            }
        }
    }

    /// Unilateral, terminal. Signals dissolution via the revocation
    /// registry so any in-flight pipeline run sees it on its next check.
    pub fn dissolve(
        &self,
        id: &IntersectionId,
        by: CircleId,
        reason: impl Into<String>,
    ) -> IntersectionResult<()> {
        let mut state = self.state.write();
        let intersection = state
            .intersections
            .get_mut(id)
            .ok_or_else(|| IntersectionError::NotFound { id: id.to_string() })?;
        intersection.state = IntersectionState::Dissolved;
        intersection.updated_at = self.clock.now();
        drop(state);
        self.revocations.revoke_intersection(id, reason, by);
        tracing::info!(intersection_id = %id, "intersection dissolved");
        Ok(())
    }

    pub fn create_invitation(
        &self,
        intersection_id: &IntersectionId,
        inviting_circle_id: CircleId,
        invited_circle_id: Option<CircleId>,
        proposed_scopes: Vec<String>,
        ttl_seconds: i64,
    ) -> IntersectionResult<Invitation> {
        self.get(intersection_id)?; // ensures the intersection exists
        let now = self.clock.now();
        let invitation = Invitation {
            id: InvitationId::new(),
            intersection_id: intersection_id.clone(),
            inviting_circle_id,
            invited_circle_id,
            proposed_scopes,
            created_at: now,
            expires_at: now + ChronoDuration::seconds(ttl_seconds),
            accepted_at: None,
        };
        self.state
            .write()
            .invitations
            .insert(invitation.id, invitation.clone());
        Ok(invitation)
    }

    pub fn validate_invitation(&self, invitation_id: &InvitationId) -> IntersectionResult<Invitation> {
        let state = self.state.read();
        let invitation = state
            .invitations
            .get(invitation_id)
            .cloned()
            .ok_or_else(|| IntersectionError::InvitationNotFound {
                id: invitation_id.to_string(),
            })?;
        if invitation.is_expired(self.clock.now()) {
            return Err(IntersectionError::InvitationExpired {
                id: invitation_id.to_string(),
            });
        }
        if invitation.is_accepted() {
            return Err(IntersectionError::InvitationAlreadyAccepted {
                id: invitation_id.to_string(),
            });
        }
        let intersection = state
            .intersections
            .get(&invitation.intersection_id)
            .cloned()
            .ok_or_else(|| IntersectionError::NotFound {
                id: invitation.intersection_id.to_string(),
            })?;
        if !matches!(
            intersection.state,
            IntersectionState::Proposed | IntersectionState::Negotiating
        ) {
            return Err(IntersectionError::NotJoinable {
                id: intersection.id.to_string(),
                state: intersection.state,
            });
        }
        Ok(invitation)
    }

    /// Accept an invitation: adds the accepting circle as an acceptor
    /// party and publishes a patch-bumped contract (membership join is
    /// not itself a scope/ceiling/approval-policy change).
    pub fn accept_invitation(
        &self,
        invitation_id: &InvitationId,
        accepting_circle: CircleId,
    ) -> IntersectionResult<Contract> {
        let invitation = self.validate_invitation(invitation_id)?;
        let mut state = self.state.write();

        let current = state
            .contracts
            .get(&invitation.intersection_id)
            .and_then(|h| h.last())
            .cloned()
            .ok_or_else(|| IntersectionError::ContractNotFound {
                id: invitation.intersection_id.to_string(),
            })?;

        let now = self.clock.now();
        let new_version = bump_version(&current.version, VersionBump::Patch)?;
        let mut parties = current.parties.clone();
        parties.push(Party {
            circle_id: accepting_circle,
            party_type: PartyType::Acceptor,
            joined_at: now,
            granted_scopes: invitation.proposed_scopes.clone(),
        });

        let new_contract = Contract {
            intersection_id: invitation.intersection_id.clone(),
            version: new_version.clone(),
            previous_version: Some(current.version.clone()),
            parties,
            scopes: current.scopes.clone(),
            ceilings: current.ceilings.clone(),
            governance: current.governance.clone(),
            approval_policy: current.approval_policy.clone(),
            financial_visibility_policy: current.financial_visibility_policy.clone(),
            published_at: now,
        };

        state
            .contracts
            .get_mut(&invitation.intersection_id)
            .expect("contract history exists")
            .push(new_contract.clone());

        if let Some(intersection) = state.intersections.get_mut(&invitation.intersection_id) {
            intersection.version = new_version;
            intersection.state = IntersectionState::Active;
            intersection.updated_at = now;
        }
        if let Some(stored) = state.invitations.get_mut(invitation_id) {
            stored.accepted_at = Some(now);
        }

        Ok(new_contract)
    }
}

fn bump_version(current: &str, bump: VersionBump) -> IntersectionResult<String> {
    let mut version = Version::parse(current).map_err(|e| IntersectionError::InvalidVersionBump {
        message: e.to_string(),
    })?;
    match bump {
        VersionBump::Major => {
            version.major += 1;
            version.minor = 0;
            version.patch = 0;
        }
        VersionBump::Minor => {
            version.minor += 1;
            version.patch = 0;
        }
        VersionBump::Patch => {
            version.patch += 1;
        }
    }
    Ok(version.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use intersect_core::{ApprovalPolicy, FixedClock, ReadWrite, Scope};

    fn store() -> IntersectionStore {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(intersect_core::clock::test_epoch()));
        let revocations = Arc::new(RevocationRegistry::new(clock.clone()));
        IntersectionStore::new(clock, revocations)
    }

    fn draft() -> ContractDraft {
        ContractDraft {
            scopes: vec![Scope::new("calendar", ReadWrite::Write)],
            ceilings: Vec::new(),
            governance: Default::default(),
            approval_policy: ApprovalPolicy::default(),
            financial_visibility_policy: None,
        }
    }

    #[test]
    fn create_then_get_round_trips() {
        let store = store();
        let (intersection, contract) = store.create("tenant1", CircleId::new("alice"), draft());
        assert_eq!(store.get(&intersection.id).unwrap().version, "1.0.0");
        assert_eq!(contract.parties.len(), 1);
    }

    #[test]
    fn amendment_requires_proposer_to_be_party() {
        let store = store();
        let (intersection, _) = store.create("t1", CircleId::new("alice"), draft());
        let result = store.propose_amendment(&intersection.id, CircleId::new("mallory"), draft());
        assert!(matches!(result, Err(IntersectionError::NotAParty { .. })));
    }

    #[test]
    fn amendment_bumps_major_on_scope_removal_and_publishes_history() {
        let store = store();
        let (intersection, _) = store.create("t1", CircleId::new("alice"), draft());
        store
            .propose_amendment(
                &intersection.id,
                CircleId::new("alice"),
                ContractDraft {
                    scopes: Vec::new(),
                    ..draft()
                },
            )
            .unwrap();
        let mut approvers = HashSet::new();
        approvers.insert(CircleId::new("alice"));
        let new_contract = store.apply_amendment(&intersection.id, &approvers).unwrap();
        assert_eq!(new_contract.version, "2.0.0");
        assert_eq!(store.get_contract_history(&intersection.id).unwrap().len(), 2);
    }

    #[test]
    fn conflicting_amendment_is_rejected() {
        let store = store();
        let (intersection, _) = store.create("t1", CircleId::new("alice"), draft());
        store
            .propose_amendment(&intersection.id, CircleId::new("alice"), draft())
            .unwrap();
        let result = store.propose_amendment(&intersection.id, CircleId::new("alice"), draft());
        assert!(matches!(result, Err(IntersectionError::ConflictingAmendmentInFlight { .. })));
    }

    #[test]
    fn dissolve_is_terminal_and_signals_revocation() {
        let store = store();
        let (intersection, _) = store.create("t1", CircleId::new("alice"), draft());
        store
            .dissolve(&intersection.id, CircleId::new("alice"), "done")
            .unwrap();
        assert_eq!(store.get(&intersection.id).unwrap().state, IntersectionState::Dissolved);
        assert!(store.revocations.is_revoked(intersection.id.as_str()).is_some());
    }

    #[test]
    fn invitation_accept_adds_party_and_bumps_patch() {
        let store = store();
        let (intersection, _) = store.create("t1", CircleId::new("alice"), draft());
        let invitation = store
            .create_invitation(
                &intersection.id,
                CircleId::new("alice"),
                Some(CircleId::new("bob")),
                vec!["calendar:write".to_string()],
                3600,
            )
            .unwrap();
        let contract = store.accept_invitation(&invitation.id, CircleId::new("bob")).unwrap();
        assert_eq!(contract.version, "1.0.1");
        assert_eq!(contract.parties.len(), 2);
        assert!(store.is_party(&intersection.id, &CircleId::new("bob")).unwrap());
    }

    #[test]
    fn expired_invitation_cannot_be_accepted() {
        let store = store();
        let (intersection, _) = store.create("t1", CircleId::new("alice"), draft());
        let invitation = store
            .create_invitation(
                &intersection.id,
                CircleId::new("alice"),
                Some(CircleId::new("bob")),
                vec![],
                -1,
            )
            .unwrap();
        let result = store.accept_invitation(&invitation.id, CircleId::new("bob"));
        assert!(matches!(result, Err(IntersectionError::InvitationExpired { .. })));
    }
}
