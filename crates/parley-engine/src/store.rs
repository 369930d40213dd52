//! In-memory deliberation store.
//!
//! Keyed storage for sessions, specialists, proposals, and votes, passed by
//! reference into every component so tests and embedders get isolated
//! instances instead of process-wide globals.
//!
//! Collections are insertion-ordered `Vec`s behind `RwLock`s. Insertion order
//! is load-bearing: the consensus evaluator's human-override rule is
//! earliest-submitted-wins, and the tally sort breaks score ties by proposal
//! submission order. Lookups are linear scans; deliberation state for one
//! cycle is small and purged on every transition.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::machine::{MachineDefinition, Session};
use crate::proposals::Proposal;
use crate::specialist::{Specialist, SpecialistRole};
use crate::votes::Vote;

/// Shared reference to a [`DeliberationStore`].
pub type SharedStore = Arc<DeliberationStore>;

/// Process-local storage backing every engine component.
#[derive(Default)]
pub struct DeliberationStore {
    sessions: RwLock<Vec<Session>>,
    specialists: RwLock<Vec<Specialist>>,
    proposals: RwLock<Vec<Proposal>>,
    votes: RwLock<Vec<Vote>>,
}

fn read<T>(lock: &RwLock<T>) -> EngineResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| EngineError::LockPoisoned)
}

fn write<T>(lock: &RwLock<T>) -> EngineResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| EngineError::LockPoisoned)
}

impl DeliberationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap this store in an `Arc` for sharing across components.
    pub fn shared(self) -> SharedStore {
        Arc::new(self)
    }

    /// Drop all sessions, specialists, proposals, and votes.
    pub fn clear(&self) -> EngineResult<()> {
        write(&self.sessions)?.clear();
        write(&self.specialists)?.clear();
        write(&self.proposals)?.clear();
        write(&self.votes)?.clear();
        Ok(())
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Create a session at the machine's initial state with a fresh UUID.
    pub fn create_session(&self, machine: MachineDefinition) -> EngineResult<Session> {
        let session = Session::new(machine);
        tracing::info!(
            session_id = %session.session_id,
            machine = %session.machine_name,
            initial_state = %session.current_state,
            "Created session"
        );
        write(&self.sessions)?.push(session.clone());
        Ok(session)
    }

    pub fn get_session(&self, session_id: Uuid) -> EngineResult<Session> {
        read(&self.sessions)?
            .iter()
            .find(|s| s.session_id == session_id)
            .cloned()
            .ok_or(EngineError::SessionNotFound(session_id))
    }

    /// All sessions, in creation order.
    pub fn list_sessions(&self) -> EngineResult<Vec<Session>> {
        Ok(read(&self.sessions)?.clone())
    }

    /// Atomically read-modify-write one session under the write lock.
    pub fn modify_session<T>(
        &self,
        session_id: Uuid,
        f: impl FnOnce(&mut Session) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut sessions = write(&self.sessions)?;
        let session = sessions
            .iter_mut()
            .find(|s| s.session_id == session_id)
            .ok_or(EngineError::SessionNotFound(session_id))?;
        f(session)
    }

    // =========================================================================
    // Specialists
    // =========================================================================

    /// Insert a specialist, replacing any prior registration with the same
    /// id. Replacement keeps the original registration position.
    pub fn upsert_specialist(&self, specialist: Specialist) -> EngineResult<()> {
        let mut specialists = write(&self.specialists)?;
        match specialists.iter_mut().find(|s| s.id == specialist.id) {
            Some(existing) => *existing = specialist,
            None => specialists.push(specialist),
        }
        Ok(())
    }

    pub fn get_specialist(&self, id: &str) -> EngineResult<Specialist> {
        self.find_specialist(id)?
            .ok_or_else(|| EngineError::SpecialistNotFound(id.to_string()))
    }

    /// Lookup that distinguishes "unknown" from a store failure; the
    /// consensus tally treats unknown voters as weight 1.0.
    pub fn find_specialist(&self, id: &str) -> EngineResult<Option<Specialist>> {
        Ok(read(&self.specialists)?
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    /// Specialists registered for a machine with the given role, in
    /// registration order.
    pub fn specialists_for(
        &self,
        machine_name: &str,
        role: SpecialistRole,
    ) -> EngineResult<Vec<Specialist>> {
        Ok(read(&self.specialists)?
            .iter()
            .filter(|s| s.machine_name == machine_name && s.role == role)
            .cloned()
            .collect())
    }

    // =========================================================================
    // Proposals and votes (ephemeral deliberation state)
    // =========================================================================

    pub fn insert_proposal(&self, proposal: Proposal) -> EngineResult<()> {
        tracing::debug!(
            proposal_id = %proposal.proposal_id,
            session_id = %proposal.session_id,
            specialist = %proposal.specialist_id,
            transition = %proposal.transition_name,
            "Recorded proposal"
        );
        write(&self.proposals)?.push(proposal);
        Ok(())
    }

    pub fn get_proposal(&self, proposal_id: Uuid) -> EngineResult<Proposal> {
        read(&self.proposals)?
            .iter()
            .find(|p| p.proposal_id == proposal_id)
            .cloned()
            .ok_or(EngineError::ProposalNotFound(proposal_id))
    }

    /// Proposals for a session, in submission order.
    pub fn proposals_for_session(&self, session_id: Uuid) -> EngineResult<Vec<Proposal>> {
        Ok(read(&self.proposals)?
            .iter()
            .filter(|p| p.session_id == session_id)
            .cloned()
            .collect())
    }

    pub fn insert_vote(&self, vote: Vote) -> EngineResult<()> {
        tracing::debug!(
            vote_id = %vote.vote_id,
            session_id = %vote.session_id,
            specialist = %vote.specialist_id,
            vote_for = ?vote.vote_for,
            "Recorded vote"
        );
        write(&self.votes)?.push(vote);
        Ok(())
    }

    /// Votes for a session, in submission order.
    pub fn votes_for_session(&self, session_id: Uuid) -> EngineResult<Vec<Vote>> {
        Ok(read(&self.votes)?
            .iter()
            .filter(|v| v.session_id == session_id)
            .cloned()
            .collect())
    }

    /// Delete every proposal and vote scoped to a session. Returns the purge
    /// counts for logging.
    pub fn purge_session_artifacts(&self, session_id: Uuid) -> EngineResult<(usize, usize)> {
        let mut proposals = write(&self.proposals)?;
        let before_p = proposals.len();
        proposals.retain(|p| p.session_id != session_id);
        let purged_p = before_p - proposals.len();
        drop(proposals);

        let mut votes = write(&self.votes)?;
        let before_v = votes.len();
        votes.retain(|v| v.session_id != session_id);
        let purged_v = before_v - votes.len();

        Ok((purged_p, purged_v))
    }
}
