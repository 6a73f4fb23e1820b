use thiserror::Error;
use wsd_core::{CancelReason, WorkspaceState};
use wsd_session::SessionError;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Flat discriminant of [`OrchestratorError`] for callers that only need
/// to branch on what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    AlreadyExists,
    NotFound,
    Corrupt,
    FactoryFailed,
    HookFailed,
    Canceled,
    InvalidTransition,
    InvalidState,
    Storage,
    Internal,
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Workspace already exists: {0}")]
    AlreadyExists(String),

    #[error("Workspace not found: {0}")]
    NotFound(String),

    #[error("Corrupt workspace session: {0}")]
    Corrupt(String),

    /// The factory's own error is the message; nothing is prepended.
    #[error("{source}")]
    FactoryFailed {
        instance_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Hook #{hook_index} '{hook}' failed for {instance_id} entering {state}: {source}")]
    HookFailed {
        instance_id: String,
        state: WorkspaceState,
        hook_index: usize,
        hook: String,
        #[source]
        source: anyhow::Error,
    },

    /// `state` is the state being entered when hooks were interrupted.
    #[error("Operation on {instance_id} aborted: {reason}")]
    Canceled {
        instance_id: String,
        state: Option<WorkspaceState>,
        reason: CancelReason,
    },

    #[error("Invalid transition for {instance_id}: {from} -> {to}")]
    InvalidTransition {
        instance_id: String,
        from: WorkspaceState,
        to: WorkspaceState,
    },

    #[error("Invalid state for {instance_id}: {state} ({reason})")]
    InvalidState {
        instance_id: String,
        state: WorkspaceState,
        reason: String,
    },

    #[error("Session store error: {0}")]
    Storage(#[source] SessionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::InvalidInput(_) => ErrorKind::InvalidInput,
            OrchestratorError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            OrchestratorError::NotFound(_) => ErrorKind::NotFound,
            OrchestratorError::Corrupt(_) => ErrorKind::Corrupt,
            OrchestratorError::FactoryFailed { .. } => ErrorKind::FactoryFailed,
            OrchestratorError::HookFailed { .. } => ErrorKind::HookFailed,
            OrchestratorError::Canceled { .. } => ErrorKind::Canceled,
            OrchestratorError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            OrchestratorError::InvalidState { .. } => ErrorKind::InvalidState,
            OrchestratorError::Storage(_) => ErrorKind::Storage,
            OrchestratorError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<SessionError> for OrchestratorError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound { instance_id, .. } => OrchestratorError::NotFound(instance_id),
            SessionError::Corrupt { path, reason } => {
                OrchestratorError::Corrupt(format!("{}: {reason}", path.display()))
            }
            SessionError::InvalidInstanceId {
                instance_id,
                reason,
            } => OrchestratorError::InvalidInput(format!(
                "instance id '{instance_id}' {reason}"
            )),
            SessionError::Serialize {
                instance_id,
                reason,
            } => OrchestratorError::InvalidInput(format!(
                "workspace '{instance_id}' cannot be stored: {reason}"
            )),
            other => OrchestratorError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_session_errors_map_to_kinds() {
        let not_found: OrchestratorError = SessionError::NotFound {
            instance_id: "inst-1".into(),
            path: PathBuf::from("/x/inst-1.workspace.json"),
        }
        .into();
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert_eq!(not_found.to_string(), "Workspace not found: inst-1");

        let corrupt: OrchestratorError = SessionError::Corrupt {
            path: PathBuf::from("/x/a.workspace.json"),
            reason: "cannot decode session".into(),
        }
        .into();
        assert_eq!(corrupt.kind(), ErrorKind::Corrupt);

        let io: OrchestratorError = SessionError::Io {
            path: PathBuf::from("/x"),
            source: std::io::Error::other("disk full"),
        }
        .into();
        assert_eq!(io.kind(), ErrorKind::Storage);

        let unstorable: OrchestratorError = SessionError::Serialize {
            instance_id: "inst-1".into(),
            reason: "path contains invalid UTF-8 characters".into(),
        }
        .into();
        assert_eq!(unstorable.kind(), ErrorKind::InvalidInput);
        assert!(unstorable.to_string().contains("cannot be stored"));
    }

    #[test]
    fn test_factory_error_is_verbatim() {
        let err = OrchestratorError::FactoryFailed {
            instance_id: "inst-1".into(),
            source: anyhow::anyhow!("image pull failed"),
        };
        assert_eq!(err.to_string(), "image pull failed");
        assert_eq!(err.kind(), ErrorKind::FactoryFailed);
    }
}
