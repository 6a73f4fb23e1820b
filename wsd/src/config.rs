//! Configuration for the wsd tool
//!
//! Read from `~/.config/wsd/config.yaml` (or `--config`). Every field has a
//! default, so a missing default file is not an error.
//!
//! ```yaml
//! session_dir: ~/.wsd/sessions
//! timeout_secs: 300
//! hooks:
//!   initializing:
//!     - name: prepare
//!       command: mkdir -p "$WSD_LOCATION/.wsd"
//! ```

use crate::hooks::CommandHook;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use wsd_core::WorkspaceState;
use wsd_orchestrator::HookRegistry;

/// Overrides `session_dir` when set
pub const SESSION_DIR_ENV: &str = "WSD_SESSION_DIR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsdConfig {
    /// Directory holding one session file per workspace
    #[serde(default = "default_session_dir")]
    pub session_dir: String,

    /// Deadline for a single operation; 0 disables it
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Shell commands to run when a workspace enters each state
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hooks: BTreeMap<WorkspaceState, Vec<HookConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HookConfig {
    pub name: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

fn default_session_dir() -> String {
    "~/.wsd/sessions".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for WsdConfig {
    fn default() -> Self {
        Self {
            session_dir: default_session_dir(),
            timeout_secs: default_timeout_secs(),
            hooks: BTreeMap::new(),
        }
    }
}

impl WsdConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_from_path(&path)?,
                _ => Self::default(),
            },
        };

        if let Ok(dir) = std::env::var(SESSION_DIR_ENV) {
            if !dir.is_empty() {
                config.session_dir = dir;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml_ng::Error> {
        // An empty file means "all defaults"
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("session_dir must not be empty".into()));
        }
        for (state, hooks) in &self.hooks {
            for (index, hook) in hooks.iter().enumerate() {
                if hook.name.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "hook #{index} for state '{state}' has no name"
                    )));
                }
                if hook.command.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "hook '{}' for state '{state}' has an empty command",
                        hook.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Session directory with `~` expanded.
    pub fn session_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.session_dir).as_ref())
    }

    pub fn timeout(&self) -> Option<std::time::Duration> {
        (self.timeout_secs > 0).then(|| std::time::Duration::from_secs(self.timeout_secs))
    }

    /// Build the registry of command hooks, preserving per-state order.
    pub fn hook_registry(&self) -> HookRegistry {
        let mut builder = HookRegistry::builder();
        for (state, hooks) in &self.hooks {
            for hook in hooks {
                builder = builder.hook(*state, Arc::new(CommandHook::from_config(hook)));
            }
        }
        builder.build()
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("wsd").join("config.yaml"))
}
