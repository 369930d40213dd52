//! Vote records and the vote collector.
//!
//! A vote compares exactly two proposals. The choice space is the pair plus
//! two escape hatches: `BOTH` endorses either outcome and `NEITHER` abstains
//! from both. The tally in the consensus evaluator interprets them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::specialist::{
    ExecutionMode, InlineStrategy, Specialist, SpecialistRole, VoterContext,
};
use crate::store::SharedStore;

/// Which proposal a vote endorses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteChoice {
    A,
    B,
    /// Endorse both proposals; counts toward each in the tally.
    Both,
    /// Endorse neither; counts toward nothing.
    Neither,
}

/// A recorded comparison of two proposals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub vote_id: Uuid,
    pub session_id: Uuid,
    pub specialist_id: String,
    pub proposal_a_id: Uuid,
    pub proposal_b_id: Uuid,
    pub vote_for: VoteChoice,
    #[serde(default)]
    pub reasoning: String,
    pub submitted_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(
        session_id: Uuid,
        specialist_id: impl Into<String>,
        proposal_a_id: Uuid,
        proposal_b_id: Uuid,
        vote_for: VoteChoice,
        reasoning: Option<String>,
    ) -> Self {
        Self {
            vote_id: Uuid::new_v4(),
            session_id,
            specialist_id: specialist_id.into(),
            proposal_a_id,
            proposal_b_id,
            vote_for,
            reasoning: reasoning.unwrap_or_default(),
            submitted_at: Utc::now(),
        }
    }
}

/// What an inline voter strategy returns.
#[derive(Debug, Clone)]
pub struct VoteDraft {
    pub vote_for: VoteChoice,
    pub reasoning: String,
}

/// Records and solicits votes for sessions in the shared store.
pub struct VoteCollector {
    store: SharedStore,
}

impl VoteCollector {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Record a vote submitted on a specialist's behalf.
    ///
    /// Pure insertion: the referenced proposals are not checked.
    pub fn submit(
        &self,
        session_id: Uuid,
        specialist_id: &str,
        proposal_a_id: Uuid,
        proposal_b_id: Uuid,
        vote_for: VoteChoice,
        reasoning: Option<String>,
    ) -> EngineResult<Vote> {
        let vote = Vote::new(
            session_id,
            specialist_id,
            proposal_a_id,
            proposal_b_id,
            vote_for,
            reasoning,
        );
        self.store.insert_vote(vote.clone())?;
        Ok(vote)
    }

    /// Ask a registered voter to compare two proposals and record the result.
    ///
    /// Unlike [`VoteCollector::submit`], both proposals must exist here: the
    /// strategy is handed their full contents.
    pub async fn solicit(
        &self,
        specialist_id: &str,
        session_id: Uuid,
        proposal_a_id: Uuid,
        proposal_b_id: Uuid,
    ) -> EngineResult<Vote> {
        let specialist = self.store.get_specialist(specialist_id)?;
        if specialist.role != SpecialistRole::Voter {
            return Err(EngineError::WrongSpecialistRole {
                id: specialist.id,
                expected: SpecialistRole::Voter,
            });
        }

        let draft = self
            .run_strategy(&specialist, session_id, proposal_a_id, proposal_b_id)
            .await?;
        self.submit(
            session_id,
            specialist_id,
            proposal_a_id,
            proposal_b_id,
            draft.vote_for,
            Some(draft.reasoning),
        )
    }

    async fn run_strategy(
        &self,
        specialist: &Specialist,
        session_id: Uuid,
        proposal_a_id: Uuid,
        proposal_b_id: Uuid,
    ) -> EngineResult<VoteDraft> {
        match &specialist.mode {
            ExecutionMode::Inline(InlineStrategy::Voter(strategy)) => {
                let session = self.store.get_session(session_id)?;
                let context = VoterContext {
                    session_id,
                    current_state: session.current_state.clone(),
                    prompt: session.machine.prompt_for(&session.current_state),
                    proposal_a: self.store.get_proposal(proposal_a_id)?,
                    proposal_b: self.store.get_proposal(proposal_b_id)?,
                    history: session.history,
                };
                strategy(context).await
            }
            ExecutionMode::Inline(InlineStrategy::Proposer(_)) => {
                Err(EngineError::InvalidExecutionMode {
                    id: specialist.id.clone(),
                    reason: "inline proposer strategy cannot produce a vote".into(),
                })
            }
            ExecutionMode::Webhook(_) => Err(EngineError::ExecutionModeNotImplemented {
                mode: "webhook",
            }),
            ExecutionMode::ModelRef(_) => Err(EngineError::ExecutionModeNotImplemented {
                mode: "model reference",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::machine::MachineDefinition;
    use crate::proposals::ProposalCollector;
    use crate::specialist::{SpecialistRegistry, SpecialistSpec, VoterFn};
    use crate::store::DeliberationStore;

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

    fn prefer_a_voter() -> VoterFn {
        Arc::new(|_ctx: VoterContext| {
            Box::pin(async {
                Ok(VoteDraft {
                    vote_for: VoteChoice::A,
                    reasoning: "first looks right".into(),
                })
            })
        })
    }

    #[test]
    fn test_choice_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(VoteChoice::Both).unwrap(),
            serde_json::json!("BOTH")
        );
        assert_eq!(
            serde_json::from_value::<VoteChoice>(serde_json::json!("NEITHER")).unwrap(),
            VoteChoice::Neither
        );
    }

    #[test]
    fn test_submit_is_pure_insertion() {
        let store = DeliberationStore::new().shared();
        let session = store.create_session(machine()).unwrap();

        // References proposals that were never recorded; stored anyway.
        let vote = VoteCollector::new(store.clone())
            .submit(
                session.session_id,
                "v-1",
                Uuid::new_v4(),
                Uuid::new_v4(),
                VoteChoice::B,
                Some("review first".into()),
            )
            .unwrap();

        assert_eq!(vote.vote_for, VoteChoice::B);
        assert_eq!(vote.reasoning, "review first");
        assert_eq!(store.votes_for_session(session.session_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_solicit_runs_inline_strategy() {
        let store = DeliberationStore::new().shared();
        let session = store.create_session(machine()).unwrap();
        let proposals = ProposalCollector::new(store.clone());
        let a = proposals
            .submit(session.session_id, "sp-1", "fast", "done", None)
            .unwrap();
        let b = proposals
            .submit(session.session_id, "sp-2", "careful", "review", None)
            .unwrap();

        SpecialistRegistry::new(store.clone())
            .register(SpecialistSpec::inline_voter("v-1", "fork", prefer_a_voter()))
            .unwrap();

        let vote = VoteCollector::new(store)
            .solicit("v-1", session.session_id, a.proposal_id, b.proposal_id)
            .await
            .unwrap();

        assert_eq!(vote.vote_for, VoteChoice::A);
        assert_eq!(vote.reasoning, "first looks right");
    }

    #[tokio::test]
    async fn test_solicit_requires_known_proposals() {
        let store = DeliberationStore::new().shared();
        let session = store.create_session(machine()).unwrap();
        SpecialistRegistry::new(store.clone())
            .register(SpecialistSpec::inline_voter("v-1", "fork", prefer_a_voter()))
            .unwrap();

        let err = VoteCollector::new(store)
            .solicit("v-1", session.session_id, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ProposalNotFound(_)));
    }

    #[tokio::test]
    async fn test_solicit_rejects_non_voter() {
        let store = DeliberationStore::new().shared();
        let session = store.create_session(machine()).unwrap();
        let proposals = ProposalCollector::new(store.clone());
        let a = proposals
            .submit(session.session_id, "sp-1", "fast", "done", None)
            .unwrap();
        let b = proposals
            .submit(session.session_id, "sp-2", "careful", "review", None)
            .unwrap();

        SpecialistRegistry::new(store.clone())
            .register(SpecialistSpec::external(
                "sp-ext",
                "fork",
                SpecialistRole::Proposer,
                ExecutionMode::ModelRef("gpt-test".into()),
            ))
            .unwrap();

        let err = VoteCollector::new(store)
            .solicit("sp-ext", session.session_id, a.proposal_id, b.proposal_id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::WrongSpecialistRole {
                expected: SpecialistRole::Voter,
                ..
            }
        ));
    }
}
