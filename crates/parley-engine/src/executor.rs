//! Transition execution.
//!
//! The executor is the only component that mutates a session's
//! `current_state`. It validates the transition against the machine at the
//! moment of execution, appends to history, and garbage-collects the
//! session's deliberation artifacts so the next cycle starts clean.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::machine::{Session, TransitionRecord};
use crate::store::SharedStore;

/// Applies consensus outcomes to sessions in the shared store.
pub struct TransitionExecutor {
    store: SharedStore,
}

impl TransitionExecutor {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Execute a transition and return the updated session.
    ///
    /// Fails with [`EngineError::InvalidTransition`] unless the current
    /// state's table maps `transition_name` to exactly `to_state`. On
    /// success every proposal and vote scoped to the session is purged.
    pub fn execute(
        &self,
        session_id: Uuid,
        transition_name: &str,
        to_state: &str,
        reasoning: Option<String>,
    ) -> EngineResult<Session> {
        let session = self.store.modify_session(session_id, |session| {
            let transitions = session.machine.transitions_from(&session.current_state);
            if transitions.get(transition_name).map(String::as_str) != Some(to_state) {
                return Err(EngineError::InvalidTransition {
                    transition: transition_name.to_string(),
                    from_state: session.current_state.clone(),
                });
            }

            session.history.push(TransitionRecord {
                from_state: session.current_state.clone(),
                to_state: to_state.to_string(),
                transition_name: transition_name.to_string(),
                reasoning: reasoning.unwrap_or_default(),
                timestamp: Utc::now(),
            });
            session.current_state = to_state.to_string();
            Ok(session.clone())
        })?;

        let (purged_proposals, purged_votes) = self.store.purge_session_artifacts(session_id)?;
        let from_state = session
            .history
            .last()
            .map(|record| record.from_state.clone())
            .unwrap_or_default();
        tracing::info!(
            session_id = %session_id,
            transition = %transition_name,
            from_state = %from_state,
            to_state = %to_state,
            purged_proposals,
            purged_votes,
            "Executed transition"
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineDefinition;
    use crate::proposals::ProposalCollector;
    use crate::store::DeliberationStore;
    use crate::votes::{VoteChoice, VoteCollector};

    fn machine() -> MachineDefinition {
        serde_json::from_value(serde_json::json!({
            "machineName": "fork",
            "initialState": "deciding",
            "defaultState": "done",
            "states": {
                "deciding": {
                    "transitions": { "fast": "done", "careful": "review" }
                },
                "review": { "transitions": { "approve": "done" } },
                "done": {}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_execute_advances_state_and_records_history() {
        let store = DeliberationStore::new().shared();
        let session = store.create_session(machine()).unwrap();

        let updated = TransitionExecutor::new(store.clone())
            .execute(
                session.session_id,
                "careful",
                "review",
                Some("needs a second look".into()),
            )
            .unwrap();

        assert_eq!(updated.current_state, "review");
        assert_eq!(updated.history.len(), 1);
        assert_eq!(updated.history[0].from_state, "deciding");
        assert_eq!(updated.history[0].to_state, "review");
        assert_eq!(updated.history[0].transition_name, "careful");
        assert_eq!(updated.history[0].reasoning, "needs a second look");

        // The stored session advanced too.
        let stored = store.get_session(session.session_id).unwrap();
        assert_eq!(stored.current_state, "review");
    }

    #[test]
    fn test_execute_rejects_unknown_transition() {
        let store = DeliberationStore::new().shared();
        let session = store.create_session(machine()).unwrap();

        let err = TransitionExecutor::new(store.clone())
            .execute(session.session_id, "abandon", "cancelled", None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid transition \"abandon\" from state \"deciding\""
        );
        assert!(store
            .get_session(session.session_id)
            .unwrap()
            .history
            .is_empty());
    }

    #[test]
    fn test_execute_rejects_mismatched_target() {
        let store = DeliberationStore::new().shared();
        let session = store.create_session(machine()).unwrap();

        // "fast" exists but maps to "done", not "review".
        let err = TransitionExecutor::new(store)
            .execute(session.session_id, "fast", "review", None)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn test_execute_purges_deliberation_artifacts() {
        let store = DeliberationStore::new().shared();
        let session = store.create_session(machine()).unwrap();
        let other = store.create_session(machine()).unwrap();

        let proposals = ProposalCollector::new(store.clone());
        let a = proposals
            .submit(session.session_id, "sp-1", "fast", "done", None)
            .unwrap();
        let b = proposals
            .submit(session.session_id, "sp-2", "careful", "review", None)
            .unwrap();
        proposals
            .submit(other.session_id, "sp-1", "fast", "done", None)
            .unwrap();
        VoteCollector::new(store.clone())
            .submit(
                session.session_id,
                "v-1",
                a.proposal_id,
                b.proposal_id,
                VoteChoice::A,
                None,
            )
            .unwrap();

        TransitionExecutor::new(store.clone())
            .execute(session.session_id, "fast", "done", None)
            .unwrap();

        assert!(store
            .proposals_for_session(session.session_id)
            .unwrap()
            .is_empty());
        assert!(store.votes_for_session(session.session_id).unwrap().is_empty());
        // Artifacts of other sessions survive.
        assert_eq!(
            store.proposals_for_session(other.session_id).unwrap().len(),
            1
        );
    }
}
