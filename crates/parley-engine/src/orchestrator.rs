//! The decision-cycle orchestrator.
//!
//! Drives a session from its initial state to its goal state, one decision
//! cycle per transition: solicit proposals, solicit pairwise votes, evaluate
//! consensus, execute the winning transition.
//!
//! Solicitation fans out concurrently and joins before evaluation. The error
//! policy is fail-fast: one failing solicitation aborts the whole cycle, and
//! a cycle without consensus aborts the run. History already committed stays
//! committed.

use std::sync::Arc;

use futures::future::try_join_all;
use uuid::Uuid;

use crate::consensus::ConsensusEvaluator;
use crate::error::{EngineError, EngineResult};
use crate::executor::TransitionExecutor;
use crate::machine::{MachineDefinition, Session};
use crate::proposals::{ProposalCollector, ProposalDraft};
use crate::specialist::{ProposerFn, SpecialistRegistry, SpecialistRole, SpecialistSpec};
use crate::store::SharedStore;
use crate::votes::VoteCollector;

/// Runs sessions to completion against the shared store.
pub struct DecisionCycleOrchestrator {
    store: SharedStore,
    registry: SpecialistRegistry,
    proposals: ProposalCollector,
    votes: VoteCollector,
    consensus: ConsensusEvaluator,
    executor: TransitionExecutor,
}

impl DecisionCycleOrchestrator {
    pub fn new(store: SharedStore) -> Self {
        Self {
            registry: SpecialistRegistry::new(store.clone()),
            proposals: ProposalCollector::new(store.clone()),
            votes: VoteCollector::new(store.clone()),
            consensus: ConsensusEvaluator::new(store.clone()),
            executor: TransitionExecutor::new(store.clone()),
            store,
        }
    }

    /// Create a session and run decision cycles until it reaches its goal
    /// state, then return it with its full history.
    ///
    /// A built-in fallback proposer is registered for the session so a run
    /// makes progress even with no external specialists configured. It picks
    /// the first transition out of the current state and fails with
    /// [`EngineError::NoTransitionsAvailable`] when there is none.
    pub async fn run_session(&self, machine: MachineDefinition) -> EngineResult<Session> {
        let machine_name = machine.machine_name.clone();
        let session = self.store.create_session(machine)?;

        self.registry.register(SpecialistSpec::inline_proposer(
            format!("__builtin-proposer-{}", session.session_id),
            machine_name.clone(),
            first_transition_proposer(),
        ))?;

        let mut current = session;
        while !current.at_goal() {
            self.run_cycle(current.session_id, &machine_name).await?;
            current = self.store.get_session(current.session_id)?;
        }

        tracing::info!(
            session_id = %current.session_id,
            machine = %machine_name,
            final_state = %current.current_state,
            transitions = current.history.len(),
            "Session reached goal state"
        );
        Ok(current)
    }

    /// One decision cycle: fan out to proposers, fan out votes over every
    /// unordered proposal pair, evaluate, execute the winner.
    async fn run_cycle(&self, session_id: Uuid, machine_name: &str) -> EngineResult<()> {
        let proposers = self
            .store
            .specialists_for(machine_name, SpecialistRole::Proposer)?;
        let proposals = try_join_all(
            proposers
                .iter()
                .map(|p| self.proposals.solicit(&p.id, session_id)),
        )
        .await?;

        if proposals.len() >= 2 {
            let voters = self
                .store
                .specialists_for(machine_name, SpecialistRole::Voter)?;
            let mut solicitations = Vec::new();
            for (i, a) in proposals.iter().enumerate() {
                for b in &proposals[i + 1..] {
                    for voter in &voters {
                        solicitations.push(self.votes.solicit(
                            &voter.id,
                            session_id,
                            a.proposal_id,
                            b.proposal_id,
                        ));
                    }
                }
            }
            try_join_all(solicitations).await?;
        }

        let verdict = self.consensus.evaluate(session_id)?;
        let winner_id = match (verdict.consensus_reached, verdict.winning_proposal_id) {
            (true, Some(id)) => id,
            _ => return Err(EngineError::NoConsensusReached(verdict.reasoning)),
        };
        let winner = proposals
            .iter()
            .find(|p| p.proposal_id == winner_id)
            .ok_or(EngineError::ProposalNotFound(winner_id))?;

        self.executor.execute(
            session_id,
            &winner.transition_name,
            &winner.to_state,
            Some(verdict.reasoning),
        )?;
        Ok(())
    }
}

/// Deterministic fallback strategy: propose the first transition out of the
/// current state, in lexicographic order.
fn first_transition_proposer() -> ProposerFn {
    Arc::new(|ctx: crate::specialist::ProposerContext| {
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
