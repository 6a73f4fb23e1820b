// CLI argument parsing and definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wsd_core::WorkspaceState;

#[derive(Debug, Clone, Parser)]
#[command(name = "wsd")]
#[command(about = "Create, track and transition long-lived workspaces")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a configuration file (default: ~/.config/wsd/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Per-operation deadline in seconds, 0 for none (overrides timeout_secs)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Materialize a new workspace and run its initializing hooks
    Create {
        /// Unique instance identifier
        instance_id: String,
        /// Directory the workspace lives in (created if missing)
        location: PathBuf,
        /// Owner recorded on the workspace
        #[arg(long, default_value = "")]
        owner: String,
        /// Logical workspace this instance belongs to
        #[arg(long, default_value = "")]
        workspace: String,
    },
    /// Show a stored workspace
    Get {
        instance_id: String,
    },
    /// List every stored workspace
    List,
    /// Move a workspace to the next lifecycle state
    Transition {
        instance_id: String,
        /// Target state (ready, stopping, stopped or failed)
        state: WorkspaceState,
    },
    /// Mark a workspace as failed
    Fail {
        instance_id: String,
        /// Reason recorded on the workspace
        reason: String,
    },
    /// Delete the record of a stopped or failed workspace
    Dispose {
        instance_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_parses_state() {
        let args = Args::parse_from(["wsd", "transition", "inst-1", "Ready"]);
        match args.command {
            Command::Transition { instance_id, state } => {
                assert_eq!(instance_id, "inst-1");
                assert_eq!(state, WorkspaceState::Ready);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_state_rejected() {
        let result = Args::try_parse_from(["wsd", "transition", "inst-1", "running"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["wsd", "list", "--timeout", "5", "-c", "/tmp/wsd.yaml"]);
        assert_eq!(args.timeout, Some(5));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/wsd.yaml")));
    }
}
