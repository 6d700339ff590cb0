//! The five registration stages and the per-stage execution log.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One stage of the A2P registration workflow.
///
/// Declaration order is execution order; `Ord` follows it, so a
/// `BTreeMap<Stage, _>` iterates stages in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    CustomerProfile,
    TrustProduct,
    BrandRegistration,
    MessagingService,
    Campaign,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::CustomerProfile,
        Stage::TrustProduct,
        Stage::BrandRegistration,
        Stage::MessagingService,
        Stage::Campaign,
    ];

    /// The key used for this stage in the persisted `steps` map.
    pub fn key(self) -> &'static str {
        match self {
            Stage::CustomerProfile => "customerProfile",
            Stage::TrustProduct => "trustProduct",
            Stage::BrandRegistration => "brandRegistration",
            Stage::MessagingService => "messagingService",
            Stage::Campaign => "campaign",
        }
    }

    /// Human-readable resource name, as used in step messages.
    pub fn label(self) -> &'static str {
        match self {
            Stage::CustomerProfile => "customer profile",
            Stage::TrustProduct => "trust product",
            Stage::BrandRegistration => "brand registration",
            Stage::MessagingService => "messaging service",
            Stage::Campaign => "campaign",
        }
    }

    /// The stage that runs after this one, or `None` for the last stage.
    pub fn next(self) -> Option<Stage> {
        let idx = Stage::ALL.iter().position(|s| *s == self)?;
        Stage::ALL.get(idx + 1).copied()
    }

    pub fn from_key(key: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.key() == key)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Lifecycle of a single step: `pending` -> `in-progress` -> `completed` | `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StepState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepState::Completed | StepState::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            StepState::Pending => 0,
            StepState::InProgress => 1,
            StepState::Completed | StepState::Failed => 2,
        }
    }

    /// Whether a step in this state may be overwritten with `next`.
    ///
    /// Terminal states never change; otherwise a step may only move forward
    /// (or stay put, which allows message-only updates).
    pub fn can_transition_to(self, next: StepState) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepState::Pending => "pending",
            StepState::InProgress => "in-progress",
            StepState::Completed => "completed",
            StepState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One entry of the `steps` map that the UI polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
    pub status: StepState,
    pub message: String,
}

impl StepStatus {
    pub fn pending() -> Self {
        Self {
            status: StepState::Pending,
            message: "Initializing...".to_string(),
        }
    }

    pub fn in_progress(stage: Stage) -> Self {
        Self {
            status: StepState::InProgress,
            message: format!("Creating {}...", stage.label()),
        }
    }

    pub fn completed(message: impl Into<String>) -> Self {
        Self {
            status: StepState::Completed,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: StepState::Failed,
            message: message.into(),
        }
    }
}

/// A fresh `steps` map with every stage pending.
pub fn initial_steps() -> BTreeMap<Stage, StepStatus> {
    Stage::ALL
        .into_iter()
        .map(|s| (s, StepStatus::pending()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_run_in_declared_order() {
        let mut walked = vec![Stage::CustomerProfile];
        while let Some(next) = walked.last().and_then(|s| s.next()) {
            walked.push(next);
        }
        assert_eq!(walked, Stage::ALL.to_vec());
    }

    #[test]
    fn stage_keys_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(Stage::from_key(stage.key()), Some(stage));
        }
        assert_eq!(Stage::from_key("brand"), None);
    }

    #[test]
    fn stage_serializes_as_key() {
        let json = serde_json::to_string(&Stage::BrandRegistration).unwrap();
        assert_eq!(json, "\"brandRegistration\"");
    }

    #[test]
    fn initial_steps_has_all_five_pending() {
        let steps = initial_steps();
        assert_eq!(steps.len(), 5);
        for (_, step) in steps {
            assert_eq!(step.status, StepState::Pending);
            assert_eq!(step.message, "Initializing...");
        }
    }

    #[test]
    fn terminal_states_never_move() {
        for next in [
            StepState::Pending,
            StepState::InProgress,
            StepState::Completed,
            StepState::Failed,
        ] {
            assert!(!StepState::Completed.can_transition_to(next));
            assert!(!StepState::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn steps_only_move_forward() {
        assert!(StepState::Pending.can_transition_to(StepState::InProgress));
        assert!(StepState::Pending.can_transition_to(StepState::Failed));
        assert!(StepState::InProgress.can_transition_to(StepState::Completed));
        assert!(!StepState::InProgress.can_transition_to(StepState::Pending));
    }

    #[test]
    fn step_state_serializes_kebab_case() {
        let json = serde_json::to_string(&StepStatus::in_progress(Stage::TrustProduct)).unwrap();
        assert_eq!(
            json,
            r#"{"status":"in-progress","message":"Creating trust product..."}"#
        );
    }
}
