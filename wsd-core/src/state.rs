use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle stage of a workspace.
///
/// The forward sequence is `initializing -> ready -> stopping -> stopped`.
/// Any non-terminal state may also drop into `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceState {
    Initializing,
    Ready,
    Stopping,
    Stopped,
    Failed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown workspace state '{0}'. Use one of: initializing, ready, stopping, stopped, failed")]
pub struct ParseStateError(pub String);

impl WorkspaceState {
    /// Forward sequence, in order. `Failed` sits outside of it.
    pub const ORDER: [WorkspaceState; 4] = [
        WorkspaceState::Initializing,
        WorkspaceState::Ready,
        WorkspaceState::Stopping,
        WorkspaceState::Stopped,
    ];

    pub const ALL: [WorkspaceState; 5] = [
        WorkspaceState::Initializing,
        WorkspaceState::Ready,
        WorkspaceState::Stopping,
        WorkspaceState::Stopped,
        WorkspaceState::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceState::Initializing => "initializing",
            WorkspaceState::Ready => "ready",
            WorkspaceState::Stopping => "stopping",
            WorkspaceState::Stopped => "stopped",
            WorkspaceState::Failed => "failed",
        }
    }

    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkspaceState::Stopped | WorkspaceState::Failed)
    }

    fn position(&self) -> Option<usize> {
        Self::ORDER.iter().position(|s| s == self)
    }

    /// Whether a workspace in `self` may move to `next`.
    pub fn can_transition_to(&self, next: WorkspaceState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == WorkspaceState::Failed {
            return true;
        }
        match (self.position(), next.position()) {
            (Some(from), Some(to)) => to == from + 1,
            _ => false,
        }
    }
}

impl fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkspaceState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == wanted)
            .ok_or_else(|| ParseStateError(s.to_string()))
    }
}
