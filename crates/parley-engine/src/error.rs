//! Error types for the decision-cycle engine.
//!
//! Every failure is surfaced synchronously to the immediate caller; nothing is
//! retried. Insufficient consensus and invalid transitions are decisive,
//! reportable outcomes rather than transient faults.

use uuid::Uuid;

use crate::specialist::SpecialistRole;

/// Error type for all engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Specialist not found: {0}")]
    SpecialistNotFound(String),

    #[error("Specialist {id} is not a {expected}")]
    WrongSpecialistRole {
        id: String,
        expected: SpecialistRole,
    },

    #[error("Invalid execution mode for {id}: {reason}")]
    InvalidExecutionMode { id: String, reason: String },

    #[error("Proposal not found: {0}")]
    ProposalNotFound(Uuid),

    #[error("Invalid transition \"{transition}\" from state \"{from_state}\"")]
    InvalidTransition {
        transition: String,
        from_state: String,
    },

    #[error("No transitions available from state \"{0}\"")]
    NoTransitionsAvailable(String),

    #[error("No consensus reached: {0}")]
    NoConsensusReached(String),

    /// Webhook and model-reference execution modes are declared in the data
    /// model but resolved by an external collaborator. Soliciting through
    /// them is a typed, documented failure.
    #[error("{mode} execution mode is not yet implemented")]
    ExecutionModeNotImplemented { mode: &'static str },

    #[error("Store lock poisoned")]
    LockPoisoned,

    /// An inline strategy callback failed. Strategies report domain failures
    /// through `anyhow` so embedders are not forced into engine error kinds.
    #[error("Specialist strategy failed: {0}")]
    Strategy(#[source] anyhow::Error),
}

/// Result type for all engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
