//! Specialists and the specialist registry.
//!
//! A specialist is a human or automated participant with a role (proposer,
//! voter, arbiter), a voting weight, and exactly one execution mode. The mode
//! is a sum type, so "zero modes" and "more than one mode" are unrepresentable
//! rather than runtime-validated. The one remaining invalid combination, an
//! inline strategy whose kind does not match the role, is rejected at
//! registration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::machine::TransitionRecord;
use crate::proposals::{Proposal, ProposalDraft};
use crate::store::SharedStore;
use crate::votes::VoteDraft;

/// Role a specialist plays in the decision cycle.
///
/// Arbiters are reserved for synthesizing final reasoning and are not
/// exercised by the consensus algorithm itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistRole {
    Proposer,
    Voter,
    Arbiter,
}

impl fmt::Display for SpecialistRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proposer => write!(f, "proposer"),
            Self::Voter => write!(f, "voter"),
            Self::Arbiter => write!(f, "arbiter"),
        }
    }
}

/// Everything a proposer sees when asked for a proposal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposerContext {
    pub session_id: Uuid,
    pub current_state: String,
    pub prompt: String,
    pub transitions: BTreeMap<String, String>,
    pub history: Vec<TransitionRecord>,
}

/// Everything a voter sees when asked to compare two proposals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterContext {
    pub session_id: Uuid,
    pub current_state: String,
    pub prompt: String,
    pub proposal_a: Proposal,
    pub proposal_b: Proposal,
    pub history: Vec<TransitionRecord>,
}

/// Inline proposer strategy: context in, proposal draft out.
pub type ProposerFn =
    Arc<dyn Fn(ProposerContext) -> BoxFuture<'static, EngineResult<ProposalDraft>> + Send + Sync>;

/// Inline voter strategy: context in, vote draft out.
pub type VoterFn =
    Arc<dyn Fn(VoterContext) -> BoxFuture<'static, EngineResult<VoteDraft>> + Send + Sync>;

/// Inline context-generation callback.
pub type ContextFn =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, EngineResult<String>> + Send + Sync>;

/// An inline strategy callback, typed by the role that may carry it.
#[derive(Clone)]
pub enum InlineStrategy {
    Proposer(ProposerFn),
    Voter(VoterFn),
}

impl InlineStrategy {
    /// The role this strategy kind is valid for.
    pub fn role(&self) -> SpecialistRole {
        match self {
            Self::Proposer(_) => SpecialistRole::Proposer,
            Self::Voter(_) => SpecialistRole::Voter,
        }
    }
}

impl fmt::Debug for InlineStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proposer(_) => write!(f, "InlineStrategy::Proposer(..)"),
            Self::Voter(_) => write!(f, "InlineStrategy::Voter(..)"),
        }
    }
}

/// Externally-resolved webhook endpoint for a specialist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTarget {
    pub url: String,
    /// Name of the secret whose value authenticates the webhook call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_name: Option<String>,
}

/// Exactly one way a specialist produces its answer.
///
/// Only [`ExecutionMode::Inline`] is executable end-to-end; webhook and
/// model-reference modes are declared contracts resolved outside the engine
/// and fail with [`EngineError::ExecutionModeNotImplemented`] when solicited.
#[derive(Clone)]
pub enum ExecutionMode {
    Inline(InlineStrategy),
    Webhook(WebhookTarget),
    ModelRef(String),
}

impl fmt::Debug for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(strategy) => write!(f, "ExecutionMode::Inline({strategy:?})"),
            Self::Webhook(target) => write!(f, "ExecutionMode::Webhook({})", target.url),
            Self::ModelRef(model) => write!(f, "ExecutionMode::ModelRef({model})"),
        }
    }
}

/// How a specialist generates supplementary context, when configured.
///
/// Declared configuration only: the engine records it but never invokes it.
/// "Both callback and webhook" is unrepresentable by construction.
#[derive(Clone)]
pub enum ContextMode {
    Inline(ContextFn),
    Webhook(String),
}

impl fmt::Debug for ContextMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => write!(f, "ContextMode::Inline(..)"),
            Self::Webhook(url) => write!(f, "ContextMode::Webhook({url})"),
        }
    }
}

/// A registered participant in the decision cycle.
#[derive(Clone)]
pub struct Specialist {
    pub id: String,
    pub machine_name: String,
    pub role: SpecialistRole,
    /// Voting weight applied during the consensus tally.
    pub weight: f64,
    pub mode: ExecutionMode,
    pub context: Option<ContextMode>,
}

impl fmt::Debug for Specialist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specialist")
            .field("id", &self.id)
            .field("machine_name", &self.machine_name)
            .field("role", &self.role)
            .field("weight", &self.weight)
            .field("mode", &self.mode)
            .field("context", &self.context)
            .finish()
    }
}

/// Registration request for a specialist.
#[derive(Clone)]
pub struct SpecialistSpec {
    pub id: String,
    pub machine_name: String,
    pub role: SpecialistRole,
    /// Defaults to 1.0 when omitted.
    pub weight: Option<f64>,
    pub mode: ExecutionMode,
    pub context: Option<ContextMode>,
}

impl SpecialistSpec {
    /// Spec for a proposer backed by an inline strategy callback.
    pub fn inline_proposer(
        id: impl Into<String>,
        machine_name: impl Into<String>,
        strategy: ProposerFn,
    ) -> Self {
        Self {
            id: id.into(),
            machine_name: machine_name.into(),
            role: SpecialistRole::Proposer,
            weight: None,
            mode: ExecutionMode::Inline(InlineStrategy::Proposer(strategy)),
            context: None,
        }
    }

    /// Spec for a voter backed by an inline strategy callback.
    pub fn inline_voter(
        id: impl Into<String>,
        machine_name: impl Into<String>,
        strategy: VoterFn,
    ) -> Self {
        Self {
            id: id.into(),
            machine_name: machine_name.into(),
            role: SpecialistRole::Voter,
            weight: None,
            mode: ExecutionMode::Inline(InlineStrategy::Voter(strategy)),
            context: None,
        }
    }

    /// Spec for a specialist resolved through an external execution mode.
    pub fn external(
        id: impl Into<String>,
        machine_name: impl Into<String>,
        role: SpecialistRole,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            id: id.into(),
            machine_name: machine_name.into(),
            role,
            weight: None,
            mode,
            context: None,
        }
    }

    /// Override the default voting weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Attach a context-generation mode.
    pub fn with_context(mut self, context: ContextMode) -> Self {
        self.context = Some(context);
        self
    }
}

/// Registers specialists into the shared store.
pub struct SpecialistRegistry {
    store: SharedStore,
}

impl SpecialistRegistry {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Register a specialist, overwriting any prior registration with the
    /// same id.
    ///
    /// Rejects an inline strategy whose kind does not match the declared
    /// role with [`EngineError::InvalidExecutionMode`].
    pub fn register(&self, spec: SpecialistSpec) -> EngineResult<Specialist> {
        if let ExecutionMode::Inline(strategy) = &spec.mode {
            if strategy.role() != spec.role {
                return Err(EngineError::InvalidExecutionMode {
                    id: spec.id,
                    reason: format!(
                        "inline {} strategy cannot back a {} specialist",
                        strategy.role(),
                        spec.role
                    ),
                });
            }
        }

        let specialist = Specialist {
            id: spec.id,
            machine_name: spec.machine_name,
            role: spec.role,
            weight: spec.weight.unwrap_or(1.0),
            mode: spec.mode,
            context: spec.context,
        };

        tracing::debug!(
            id = %specialist.id,
            machine = %specialist.machine_name,
            role = %specialist.role,
            weight = specialist.weight,
            "Registered specialist"
        );

        self.store.upsert_specialist(specialist.clone())?;
        Ok(specialist)
    }
}
