use serde::{Deserialize, Serialize};

use trimtrack_core::error::{EngineError, EngineResult};

use crate::types::RedemptionState;

/// Describes a single valid state transition for a redemption record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: RedemptionState,
    pub to: RedemptionState,
    pub trigger: String,
}

/// Guards the redemption lifecycle by enforcing a finite set of valid
/// state transitions:
/// `locked → earned → pending_redemption → redeemed [→ earned]`,
/// where the last edge is the repeatable-achievement cycle.
#[derive(Debug, Clone)]
pub struct RedemptionStateMachine {
    transitions: Vec<StateTransition>,
}

impl RedemptionStateMachine {
    pub fn new() -> Self {
        let transitions = vec![
            StateTransition {
                from: RedemptionState::Locked,
                to: RedemptionState::Earned,
                trigger: "progress_earned".to_string(),
            },
            StateTransition {
                from: RedemptionState::Earned,
                to: RedemptionState::PendingRedemption,
                trigger: "request_redemption".to_string(),
            },
            // Self-service rewards skip the manual handoff step.
            StateTransition {
                from: RedemptionState::Earned,
                to: RedemptionState::Redeemed,
                trigger: "confirm_redemption".to_string(),
            },
            StateTransition {
                from: RedemptionState::PendingRedemption,
                to: RedemptionState::Redeemed,
                trigger: "confirm_redemption".to_string(),
            },
            StateTransition {
                from: RedemptionState::Redeemed,
                to: RedemptionState::Earned,
                trigger: "repeat_cycle".to_string(),
            },
        ];
        Self { transitions }
    }

    /// Returns `true` if the given transition is allowed.
    pub fn can_transition(&self, from: RedemptionState, to: RedemptionState) -> bool {
        self.transitions.iter().any(|t| t.from == from && t.to == to)
    }

    /// Checks a transition, returning `InvalidState` when not permitted.
    pub fn check(&self, from: RedemptionState, to: RedemptionState) -> EngineResult<()> {
        if self.can_transition(from, to) {
            Ok(())
        } else {
            Err(EngineError::InvalidState(format!(
                "transition {:?} -> {:?} is not permitted",
                from, to
            )))
        }
    }
}

impl Default for RedemptionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
