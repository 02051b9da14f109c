//! Session lifecycle states.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a training session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Training session state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session has run yet.
    #[default]
    Idle,
    /// Epochs are being scheduled.
    Running,
    /// The current epoch may finish but no new one starts.
    Paused,
    /// Every requested epoch finished.
    Completed,
    /// The user stopped the session.
    Stopped,
    /// The runtime raised an error.
    Failed,
}

impl SessionState {
    /// Running or Paused.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed)
    }

    /// Checks if a session can move to the given state.
    #[must_use]
    #[allow(clippy::match_same_arms)] // Each arm represents a distinct transition rule
    pub fn can_transition_to(self, to: Self) -> bool {
        match (self, to) {
            // A new session starts from Idle or after any terminal state
            (Self::Idle | Self::Completed | Self::Stopped | Self::Failed, Self::Running) => true,
            (Self::Running, Self::Paused | Self::Completed | Self::Stopped | Self::Failed) => true,
            (Self::Paused, Self::Running | Self::Completed | Self::Stopped | Self::Failed) => true,
            (a, b) if a == b => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        assert!(SessionState::Idle.can_transition_to(SessionState::Running));
        assert!(!SessionState::Idle.can_transition_to(SessionState::Paused));
        assert!(!SessionState::Idle.can_transition_to(SessionState::Completed));

        assert!(SessionState::Running.can_transition_to(SessionState::Paused));
        assert!(SessionState::Running.can_transition_to(SessionState::Stopped));
        assert!(SessionState::Running.can_transition_to(SessionState::Failed));
        assert!(!SessionState::Running.can_transition_to(SessionState::Idle));

        assert!(SessionState::Paused.can_transition_to(SessionState::Running));
        assert!(SessionState::Paused.can_transition_to(SessionState::Stopped));
        assert!(SessionState::Paused.can_transition_to(SessionState::Completed));
        assert!(!SessionState::Paused.can_transition_to(SessionState::Idle));

        assert!(SessionState::Stopped.can_transition_to(SessionState::Running));
        assert!(!SessionState::Completed.can_transition_to(SessionState::Paused));
    }

    #[test]
    fn test_active_and_terminal() {
        assert!(SessionState::Running.is_active());
        assert!(SessionState::Paused.is_active());
        assert!(!SessionState::Idle.is_active());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Paused.is_terminal());
    }
}
