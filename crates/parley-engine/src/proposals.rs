//! Proposal records and the proposal collector.
//!
//! Recording is permissive: a submitted proposal is stored without checking
//! it against the session's transition table. Validation happens once, at
//! execution time, so a losing or stale proposal never produces an error on
//! its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::specialist::{
    ExecutionMode, InlineStrategy, ProposerContext, Specialist, SpecialistRole,
};
use crate::store::SharedStore;

/// A proposed transition, recorded against a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub proposal_id: Uuid,
    pub session_id: Uuid,
    pub specialist_id: String,
    pub transition_name: String,
    pub to_state: String,
    #[serde(default)]
    pub reasoning: String,
    pub submitted_at: DateTime<Utc>,
}

impl Proposal {
    pub fn new(
        session_id: Uuid,
        specialist_id: impl Into<String>,
        transition_name: impl Into<String>,
        to_state: impl Into<String>,
        reasoning: Option<String>,
    ) -> Self {
        Self {
            proposal_id: Uuid::new_v4(),
            session_id,
            specialist_id: specialist_id.into(),
            transition_name: transition_name.into(),
            to_state: to_state.into(),
            reasoning: reasoning.unwrap_or_default(),
            submitted_at: Utc::now(),
        }
    }
}

/// What an inline proposer strategy returns.
#[derive(Debug, Clone)]
pub struct ProposalDraft {
    pub transition_name: String,
    pub to_state: String,
    pub reasoning: String,
}

/// Records and solicits proposals for sessions in the shared store.
pub struct ProposalCollector {
    store: SharedStore,
}

impl ProposalCollector {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Record a proposal submitted on a specialist's behalf.
    ///
    /// Pure insertion: neither the session nor the transition is checked.
    pub fn submit(
        &self,
        session_id: Uuid,
        specialist_id: &str,
        transition_name: &str,
        to_state: &str,
        reasoning: Option<String>,
    ) -> EngineResult<Proposal> {
        let proposal = Proposal::new(session_id, specialist_id, transition_name, to_state, reasoning);
        self.store.insert_proposal(proposal.clone())?;
        Ok(proposal)
    }

    /// Ask a registered proposer for a proposal and record the result.
    ///
    /// Only inline strategies are executable; webhook and model-reference
    /// specialists fail with [`EngineError::ExecutionModeNotImplemented`].
    pub async fn solicit(&self, specialist_id: &str, session_id: Uuid) -> EngineResult<Proposal> {
        let specialist = self.store.get_specialist(specialist_id)?;
        if specialist.role != SpecialistRole::Proposer {
            return Err(EngineError::WrongSpecialistRole {
                id: specialist.id,
                expected: SpecialistRole::Proposer,
            });
        }

        let draft = self.run_strategy(&specialist, session_id).await?;
        self.submit(
            session_id,
            specialist_id,
            &draft.transition_name,
            &draft.to_state,
            Some(draft.reasoning),
        )
    }

    async fn run_strategy(
        &self,
        specialist: &Specialist,
        session_id: Uuid,
    ) -> EngineResult<ProposalDraft> {
        match &specialist.mode {
            ExecutionMode::Inline(InlineStrategy::Proposer(strategy)) => {
                let session = self.store.get_session(session_id)?;
                let context = ProposerContext {
                    session_id,
                    current_state: session.current_state.clone(),
                    prompt: session.machine.prompt_for(&session.current_state),
                    transitions: session.machine.transitions_from(&session.current_state),
                    history: session.history,
                };
                strategy(context).await
            }
            // Registration rejects this pairing; defend against a store
            // populated outside the registry.
            ExecutionMode::Inline(InlineStrategy::Voter(_)) => {
                Err(EngineError::InvalidExecutionMode {
                    id: specialist.id.clone(),
                    reason: "inline voter strategy cannot produce a proposal".into(),
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
    use crate::specialist::{ProposerFn, SpecialistRegistry, SpecialistSpec, WebhookTarget};
    use crate::store::DeliberationStore;

    fn machine() -> MachineDefinition {
        serde_json::from_value(serde_json::json!({
            "machineName": "simple-task",
            "initialState": "pending",
            "defaultState": "done",
            "states": {
                "pending": {
                    "prompt": "Should we complete this task?",
                    "transitions": { "complete": "done" }
                },
                "done": {}
            }
        }))
        .unwrap()
    }

    fn first_transition_proposer() -> ProposerFn {
        Arc::new(|ctx: ProposerContext| {
            Box::pin(async move {
                let (name, to_state) = ctx
                    .transitions
                    .iter()
                    .next()
                    .map(|(n, t)| (n.clone(), t.clone()))
                    .ok_or_else(|| EngineError::NoTransitionsAvailable(ctx.current_state))?;
                Ok(ProposalDraft {
                    transition_name: name,
                    to_state,
                    reasoning: "First available transition".into(),
                })
            })
        })
    }

    #[test]
    fn test_submit_is_pure_insertion() {
        let store = DeliberationStore::new().shared();
        let session = store.create_session(machine()).unwrap();
        let collector = ProposalCollector::new(store.clone());

        // Not a valid transition from "pending"; recorded anyway.
        let proposal = collector
            .submit(session.session_id, "sp-1", "abandon", "cancelled", None)
            .unwrap();

        assert_eq!(proposal.to_state, "cancelled");
        assert_eq!(proposal.reasoning, "");
        assert_eq!(
            store
                .proposals_for_session(session.session_id)
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_solicit_runs_inline_strategy() {
        let store = DeliberationStore::new().shared();
        let session = store.create_session(machine()).unwrap();
        SpecialistRegistry::new(store.clone())
            .register(SpecialistSpec::inline_proposer(
                "sp-1",
                "simple-task",
                first_transition_proposer(),
            ))
            .unwrap();

        let collector = ProposalCollector::new(store.clone());
        let proposal = collector.solicit("sp-1", session.session_id).await.unwrap();

        assert_eq!(proposal.transition_name, "complete");
        assert_eq!(proposal.to_state, "done");
        assert_eq!(proposal.reasoning, "First available transition");
        assert_eq!(
            store.get_proposal(proposal.proposal_id).unwrap().proposal_id,
            proposal.proposal_id
        );
    }

    #[tokio::test]
    async fn test_solicit_requires_session() {
        let store = DeliberationStore::new().shared();
        SpecialistRegistry::new(store.clone())
            .register(SpecialistSpec::inline_proposer(
                "sp-1",
                "simple-task",
                first_transition_proposer(),
            ))
            .unwrap();

        let err = ProposalCollector::new(store)
            .solicit("sp-1", Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_solicit_rejects_non_proposer() {
        let store = DeliberationStore::new().shared();
        let session = store.create_session(machine()).unwrap();
        SpecialistRegistry::new(store.clone())
            .register(SpecialistSpec::external(
                "v-1",
                "simple-task",
                SpecialistRole::Voter,
                ExecutionMode::ModelRef("gpt-test".into()),
            ))
            .unwrap();

        let collector = ProposalCollector::new(store);
        let err = collector
            .solicit("v-1", session.session_id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::WrongSpecialistRole {
                expected: SpecialistRole::Proposer,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_solicit_webhook_not_implemented() {
        let store = DeliberationStore::new().shared();
        let session = store.create_session(machine()).unwrap();
        SpecialistRegistry::new(store.clone())
            .register(SpecialistSpec::external(
                "hook-1",
                "simple-task",
                SpecialistRole::Proposer,
                ExecutionMode::Webhook(WebhookTarget {
                    url: "https://example.test/propose".into(),
                    token_name: None,
                }),
            ))
            .unwrap();

        let collector = ProposalCollector::new(store);
        let err = collector
            .solicit("hook-1", session.session_id)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "webhook execution mode is not yet implemented"
        );
    }

    #[tokio::test]
    async fn test_solicit_unknown_specialist() {
        let store = DeliberationStore::new().shared();
        let session = store.create_session(machine()).unwrap();
        let collector = ProposalCollector::new(store);
        let err = collector
            .solicit("ghost", session.session_id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SpecialistNotFound(_)));
    }
}
