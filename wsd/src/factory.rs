use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use wsd_core::OpContext;
use wsd_orchestrator::WorkspaceFactory;
use wsd_session::Workspace;

/// Materializes a workspace as a plain directory.
///
/// The location is created if missing and stored as an absolute path, so the
/// record stays valid regardless of the directory later commands run from.
#[derive(Debug, Clone, Default)]
pub struct DirectoryFactory {
    pub owner_id: String,
    pub workspace_id: String,
}

impl DirectoryFactory {
    pub fn new(owner_id: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            workspace_id: workspace_id.into(),
        }
    }
}

#[async_trait]
impl WorkspaceFactory for DirectoryFactory {
    async fn create(&self, _ctx: &OpContext, location: &Path) -> anyhow::Result<Workspace> {
        tokio::fs::create_dir_all(location)
            .await
            .with_context(|| format!("Failed to create workspace directory {}", location.display()))?;
        let location = tokio::fs::canonicalize(location)
            .await
            .with_context(|| format!("Failed to resolve {}", location.display()))?;

        Ok(Workspace::new(
            "",
            self.owner_id.as_str(),
            self.workspace_id.as_str(),
            location,
        ))
    }
}
