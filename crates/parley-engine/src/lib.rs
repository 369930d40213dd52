//! Parley Decision-Cycle Engine
//!
//! This library coordinates specialists deliberating over finite-state
//! machine sessions:
//! - Sessions track a machine's current state and an append-only history
//! - Specialists (proposers, voters, arbiters) carry a weight and exactly
//!   one execution mode
//! - Proposal and vote collectors record and solicit deliberation artifacts
//! - The consensus evaluator picks a winner (human override, then weighted
//!   tally with a required margin)
//! - The transition executor validates and applies the winning transition,
//!   purging the cycle's ephemeral state
//! - The orchestrator loops decision cycles until a session reaches its
//!   goal state
//!
//! All state lives in a [`DeliberationStore`] passed by reference into every
//! component, so embedders and tests get isolated instances.
//!
//! # Usage
//!
//! ```no_run
//! use parley_engine::{DecisionCycleOrchestrator, DeliberationStore, MachineDefinition};
//!
//! # async fn run(machine: MachineDefinition) -> anyhow::Result<()> {
//! let store = DeliberationStore::new().shared();
//! let orchestrator = DecisionCycleOrchestrator::new(store);
//! let session = orchestrator.run_session(machine).await?;
//! println!("finished in {}", session.current_state);
//! # Ok(())
//! # }
//! ```

pub mod consensus;
pub mod error;
pub mod executor;
pub mod machine;
pub mod orchestrator;
pub mod proposals;
pub mod specialist;
pub mod store;
pub mod votes;

// Re-export key engine types
pub use consensus::{ConsensusEvaluator, ConsensusResult, CONSENSUS_MARGIN};
pub use error::{EngineError, EngineResult};
pub use executor::TransitionExecutor;
pub use machine::{MachineDefinition, Session, StateConfig, TransitionRecord};
pub use orchestrator::DecisionCycleOrchestrator;
pub use proposals::{Proposal, ProposalCollector, ProposalDraft};
pub use specialist::{
    ContextFn, ContextMode, ExecutionMode, InlineStrategy, ProposerContext, ProposerFn,
    Specialist, SpecialistRegistry, SpecialistRole, SpecialistSpec, VoterContext, VoterFn,
    WebhookTarget,
};
pub use store::{DeliberationStore, SharedStore};
pub use votes::{Vote, VoteChoice, VoteCollector, VoteDraft};
