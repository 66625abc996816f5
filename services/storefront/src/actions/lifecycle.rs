//! Marketplace action lifecycle management

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{StorefrontError, StorefrontResult};

/// Phase of one in-flight marketplace action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionPhase {
    /// Nothing in flight; surface can be (re)opened
    #[default]
    Idle,
    /// User confirmed; wallet interaction pending
    Created,
    /// Order or transaction handed to the network
    Submitted,
    /// Settlement observed (or assumed after the fixed delay)
    Completed,
    /// Shown to the user as done; caches refreshed
    Success,
}

impl fmt::Display for ActionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Created => "created",
            Self::Submitted => "submitted",
            Self::Completed => "completed",
            Self::Success => "success",
        };
        f.write_str(name)
    }
}

/// Action lifecycle manager
#[derive(Debug, Clone)]
pub struct ActionLifecycle {
    /// Valid state transitions
    valid_transitions: FxHashMap<ActionPhase, Vec<ActionPhase>>,
}

impl Default for ActionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionLifecycle {
    /// Create new lifecycle manager
    #[must_use]
    pub fn new() -> Self {
        let mut valid_transitions = FxHashMap::default();

        valid_transitions.insert(ActionPhase::Idle, vec![ActionPhase::Created]);
        valid_transitions.insert(
            ActionPhase::Created,
            vec![ActionPhase::Submitted, ActionPhase::Idle],
        );
        valid_transitions.insert(
            ActionPhase::Submitted,
            vec![ActionPhase::Completed, ActionPhase::Idle],
        );
        valid_transitions.insert(
            ActionPhase::Completed,
            vec![ActionPhase::Success, ActionPhase::Idle],
        );
        // Success only leaves when the surface closes
        valid_transitions.insert(ActionPhase::Success, vec![ActionPhase::Idle]);

        Self { valid_transitions }
    }

    /// Validate state transition
    pub fn validate_transition(&self, current: ActionPhase, next: ActionPhase) -> StorefrontResult<()> {
        if self
            .valid_transitions
            .get(&current)
            .is_some_and(|allowed| allowed.contains(&next))
        {
            debug!("Valid transition: {} -> {}", current, next);
            return Ok(());
        }
        Err(StorefrontError::Validation {
            message: format!("Invalid action transition: {current} -> {next}"),
        })
    }

    /// Get next valid states
    #[must_use]
    pub fn get_valid_transitions(&self, phase: ActionPhase) -> Vec<ActionPhase> {
        self.valid_transitions
            .get(&phase)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether an action is between confirmation and success
    #[must_use]
    pub const fn is_in_flight(phase: ActionPhase) -> bool {
        matches!(
            phase,
            ActionPhase::Created | ActionPhase::Submitted | ActionPhase::Completed
        )
    }
}
