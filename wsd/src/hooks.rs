// Shell-command lifecycle hooks

use crate::config::HookConfig;
use anyhow::{bail, Context};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use wsd_core::OpContext;
use wsd_orchestrator::Hook;
use wsd_session::Workspace;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs `sh -c <command>` inside the workspace directory.
///
/// The command sees `WSD_INSTANCE_ID`, `WSD_OWNER_ID`, `WSD_WORKSPACE_ID`,
/// `WSD_LOCATION` and `WSD_STATE` (the state being entered), plus any
/// configured `env`. A non-zero exit fails the hook with the captured
/// output.
#[derive(Debug, Clone)]
pub struct CommandHook {
    name: String,
    command: String,
    env: BTreeMap<String, String>,
}

impl CommandHook {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &HookConfig) -> Self {
        let mut hook = Self::new(&config.name, &config.command);
        hook.env = config.env.clone();
        hook
    }

    fn expression(&self, workspace: &Workspace, output: &Path) -> duct::Expression {
        let mut expr = duct::cmd("sh", ["-c", self.command.as_str()])
            .env("WSD_INSTANCE_ID", &workspace.instance_id)
            .env("WSD_OWNER_ID", &workspace.owner_id)
            .env("WSD_WORKSPACE_ID", &workspace.workspace_id)
            .env("WSD_LOCATION", &workspace.location)
            .env("WSD_STATE", workspace.state.as_str());
        for (key, value) in &self.env {
            expr = expr.env(key, value);
        }
        if workspace.location.is_dir() {
            expr = expr.dir(&workspace.location);
        }
        // Output goes to a file rather than a pipe: a grandchild holding a
        // pipe open would stall killing the command.
        expr.stdin_null()
            .stderr_to_stdout()
            .stdout_path(output)
            .unchecked()
    }
}

/// Kills the child if the hook future is dropped before it exits.
struct ChildGuard {
    handle: duct::Handle,
    exited: bool,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.exited {
            if let Err(e) = self.handle.kill() {
                warn!("Failed to kill abandoned hook process: {}", e);
            }
        }
    }
}

#[async_trait]
impl Hook for CommandHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &OpContext, workspace: &mut Workspace) -> anyhow::Result<()> {
        debug!(hook = %self.name, command = %self.command, "starting hook command");
        let log = tempfile::NamedTempFile::new().context("failed to create hook output file")?;
        let mut child = ChildGuard {
            handle: self
                .expression(workspace, log.path())
                .start()
                .with_context(|| format!("failed to spawn hook '{}'", self.name))?,
            exited: false,
        };

        // The orchestrator drops this future on cancellation; the guard
        // then kills the process.
        let status = loop {
            if let Some(output) = child.handle.try_wait()? {
                break output.status;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        };
        child.exited = true;

        let captured = tokio::fs::read(log.path())
            .await
            .context("failed to read hook output")?;
        let text = String::from_utf8_lossy(&captured);
        let text = text.trim();
        if !status.success() {
            bail!("command `{}` exited with {}: {}", self.command, status, text);
        }
        debug!(hook = %self.name, output = %text, "hook command finished");
        Ok(())
    }
}
