//! Machine definitions and session state.
//!
//! A [`MachineDefinition`] is the immutable description of a finite-state
//! task: named states, per-state prompts, and a transition table mapping
//! transition names to target states. A [`Session`] is one run of a machine,
//! owning its `current_state` and an append-only transition history.
//!
//! Transition tables use `BTreeMap` so "first transition" is deterministic
//! (lexicographic order), independent of definition-file key order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable definition of a finite-state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDefinition {
    /// Name of the machine; specialists are registered against it.
    pub machine_name: String,
    /// State a fresh session starts in.
    pub initial_state: String,
    /// Goal state; a session run terminates when it is reached.
    pub default_state: String,
    /// State name to per-state configuration.
    #[serde(default)]
    pub states: BTreeMap<String, StateConfig>,
}

/// Configuration for a single state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateConfig {
    /// Prompt shown to specialists deliberating in this state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Transition name to target state.
    #[serde(default)]
    pub transitions: BTreeMap<String, String>,
}

impl MachineDefinition {
    /// Configuration for a state, if the state is declared.
    pub fn state(&self, name: &str) -> Option<&StateConfig> {
        self.states.get(name)
    }

    /// Transition table out of a state. Undeclared states have no transitions.
    pub fn transitions_from(&self, state: &str) -> BTreeMap<String, String> {
        self.state(state)
            .map(|s| s.transitions.clone())
            .unwrap_or_default()
    }

    /// Prompt for a state, empty when unset.
    pub fn prompt_for(&self, state: &str) -> String {
        self.state(state)
            .and_then(|s| s.prompt.clone())
            .unwrap_or_default()
    }
}

/// One executed transition in a session's history.
///
/// Append-only: never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub from_state: String,
    pub to_state: String,
    pub transition_name: String,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
}

/// One run of a machine.
///
/// `current_state` is mutated only by the transition executor; `history` is
/// owned exclusively by the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: Uuid,
    pub machine_name: String,
    pub current_state: String,
    pub machine: MachineDefinition,
    pub history: Vec<TransitionRecord>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session at the machine's initial state.
    pub fn new(machine: MachineDefinition) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            machine_name: machine.machine_name.clone(),
            current_state: machine.initial_state.clone(),
            machine,
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Whether the session has reached its goal state.
    pub fn at_goal(&self) -> bool {
        self.current_state == self.machine.default_state
    }
}
