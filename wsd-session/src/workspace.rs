use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use wsd_core::{Owi, WorkspaceState};

/// Durable record of a workspace, as written to its session file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    /// Globally unique, immutable after creation
    pub instance_id: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub workspace_id: String,
    /// Where the materialized workspace content lives
    pub location: PathBuf,
    pub state: WorkspaceState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Reason recorded when the workspace entered `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Free-form values set by factories and hooks (container id, ports, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Workspace {
    /// A fresh workspace in the `initializing` state.
    pub fn new(
        instance_id: impl Into<String>,
        owner_id: impl Into<String>,
        workspace_id: impl Into<String>,
        location: impl Into<PathBuf>,
    ) -> Self {
        let now = Utc::now();
        Self {
            instance_id: instance_id.into(),
            owner_id: owner_id.into(),
            workspace_id: workspace_id.into(),
            location: location.into(),
            state: WorkspaceState::Initializing,
            created_at: now,
            updated_at: now,
            last_error: None,
            annotations: BTreeMap::new(),
        }
    }

    pub fn owi(&self) -> Owi {
        Owi::new(&self.owner_id, &self.workspace_id, &self.instance_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.annotations.insert(key.into(), value.into());
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}
