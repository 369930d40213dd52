//! Consensus evaluation over a session's proposals and votes.
//!
//! Evaluation is pure with respect to the store: it reads the session's
//! deliberation artifacts and computes a verdict without mutating anything.
//! The decision ladder, in order:
//!
//! 1. zero proposals: no consensus
//! 2. exactly one proposal: automatic consensus
//! 3. human override: the earliest-submitted vote from a specialist whose id
//!    contains "human" (case-insensitive) decides outright, when it picks A
//!    or B
//! 4. weighted tally: the leader wins iff it is ahead of the runner-up by at
//!    least [`CONSENSUS_MARGIN`]

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineResult;
use crate::store::SharedStore;
use crate::votes::{Vote, VoteChoice};

/// Score gap the leading proposal needs over the runner-up.
pub const CONSENSUS_MARGIN: f64 = 1.0;

/// Verdict of one consensus evaluation.
///
/// `reasoning` is a fixed-form justification for the audit trail, never free
/// text from a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusResult {
    pub consensus_reached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_proposal_id: Option<Uuid>,
    pub reasoning: String,
}

impl ConsensusResult {
    fn reached(winning_proposal_id: Uuid, reasoning: impl Into<String>) -> Self {
        Self {
            consensus_reached: true,
            winning_proposal_id: Some(winning_proposal_id),
            reasoning: reasoning.into(),
        }
    }

    fn not_reached(reasoning: impl Into<String>) -> Self {
        Self {
            consensus_reached: false,
            winning_proposal_id: None,
            reasoning: reasoning.into(),
        }
    }
}

/// Evaluates consensus for sessions in the shared store.
pub struct ConsensusEvaluator {
    store: SharedStore,
}

impl ConsensusEvaluator {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn evaluate(&self, session_id: Uuid) -> EngineResult<ConsensusResult> {
        let proposals = self.store.proposals_for_session(session_id)?;

        if proposals.is_empty() {
            return Ok(ConsensusResult::not_reached("No proposals submitted"));
        }
        if proposals.len() == 1 {
            return Ok(ConsensusResult::reached(
                proposals[0].proposal_id,
                "Single proposal — auto-consensus",
            ));
        }

        let votes = self.store.votes_for_session(session_id)?;

        if let Some(result) = self.human_override(&votes)? {
            return Ok(result);
        }

        // Weighted tally. Seeded with the session's proposals at zero so an
        // unvoted proposal still counts as a runner-up; votes referencing
        // other proposal ids add entries as they arrive, matching the
        // submission-ordered seed.
        let mut tally: Vec<(Uuid, f64)> = proposals
            .iter()
            .map(|p| (p.proposal_id, 0.0))
            .collect();
        for vote in &votes {
            let weight = self
                .store
                .find_specialist(&vote.specialist_id)?
                .map(|s| s.weight)
                .unwrap_or(1.0);
            match vote.vote_for {
                VoteChoice::A => add_score(&mut tally, vote.proposal_a_id, weight),
                VoteChoice::B => add_score(&mut tally, vote.proposal_b_id, weight),
                VoteChoice::Both => {
                    add_score(&mut tally, vote.proposal_a_id, weight);
                    add_score(&mut tally, vote.proposal_b_id, weight);
                }
                VoteChoice::Neither => {}
            }
        }

        // Stable sort keeps submission order among equal scores.
        tally.sort_by(|a, b| b.1.total_cmp(&a.1));
        let (leader_id, leader_score) = tally[0];
        let runner_up_score = tally.get(1).map(|&(_, s)| s).unwrap_or(0.0);
        let gap = leader_score - runner_up_score;

        if gap >= CONSENSUS_MARGIN {
            Ok(ConsensusResult::reached(
                leader_id,
                format!("Leading proposal ahead by {gap} votes"),
            ))
        } else {
            Ok(ConsensusResult::not_reached(format!(
                "No proposal leads by required margin (gap: {gap})"
            )))
        }
    }

    /// A human participant's explicit preference trumps the tally. Votes are
    /// scanned in submission order, so with several human votes the earliest
    /// decides. `BOTH` and `NEITHER` express no preference and never
    /// override.
    fn human_override(&self, votes: &[Vote]) -> EngineResult<Option<ConsensusResult>> {
        for vote in votes {
            if !vote.specialist_id.to_lowercase().contains("human") {
                continue;
            }
            let winner_id = match vote.vote_for {
                VoteChoice::A => vote.proposal_a_id,
                VoteChoice::B => vote.proposal_b_id,
                VoteChoice::Both | VoteChoice::Neither => continue,
            };
            // The winning proposal may have been purged; fall back to its id.
            let preferred = match self.store.get_proposal(winner_id) {
                Ok(p) => p.to_state,
                Err(_) => winner_id.to_string(),
            };
            return Ok(Some(ConsensusResult::reached(
                winner_id,
                format!("The human preferred: {preferred}"),
            )));
        }
        Ok(None)
    }
}

fn add_score(tally: &mut Vec<(Uuid, f64)>, proposal_id: Uuid, weight: f64) {
    match tally.iter_mut().find(|(id, _)| *id == proposal_id) {
        Some((_, score)) => *score += weight,
        None => tally.push((proposal_id, weight)),
    }
}
