//! Workspace lifecycle orchestration
//!
//! [`WorkspaceProvider`] creates workspaces through a caller-supplied
//! [`WorkspaceFactory`], runs the [`Hook`]s registered for each lifecycle
//! state, and persists the result through a
//! [`SessionStore`](wsd_session::SessionStore) so workspaces can be found
//! again by instance id after a restart.

pub mod error;
pub mod factory;
pub mod hooks;
pub mod locks;
pub mod provider;

pub use error::{ErrorKind, OrchestratorError, Result};
pub use factory::{FnFactory, WorkspaceFactory};
pub use hooks::{hook_fn, FnHook, Hook, HookRegistry, HookRegistryBuilder};
pub use locks::InstanceLocks;
pub use provider::WorkspaceProvider;
