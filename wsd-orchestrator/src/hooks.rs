//! Lifecycle hooks and the registry that binds them to states.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use wsd_core::{OpContext, WorkspaceState};
use wsd_session::Workspace;

/// A unit of side-effecting work run when a workspace enters a state.
///
/// Hooks for one state run one after another in registration order, each
/// seeing the changes earlier hooks made to the workspace. Blocking work
/// must honor `ctx`: the orchestrator abandons a hook once the context is
/// done, so anything the hook started outside its own future has to be
/// cleaned up on drop.
#[async_trait]
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &OpContext, workspace: &mut Workspace) -> anyhow::Result<()>;
}

/// Hook backed by a synchronous closure.
pub struct FnHook<F> {
    name: String,
    f: F,
}

impl<F> FnHook<F>
where
    F: Fn(&OpContext, &mut Workspace) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(&OpContext, &mut Workspace) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &OpContext, workspace: &mut Workspace) -> anyhow::Result<()> {
        (self.f)(ctx, workspace)
    }
}

/// Shorthand for an `Arc<dyn Hook>` built from a closure.
pub fn hook_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn Hook>
where
    F: Fn(&OpContext, &mut Workspace) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHook::new(name, f))
}

/// Immutable mapping from lifecycle state to its ordered hooks.
///
/// Built once and shared read-only. To change the hooks, build a new
/// registry and hand it to [`WorkspaceProvider::with_hooks`](crate::WorkspaceProvider::with_hooks).
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<WorkspaceState, Vec<Arc<dyn Hook>>>,
}

impl HookRegistry {
    pub fn new(hooks: HashMap<WorkspaceState, Vec<Arc<dyn Hook>>>) -> Self {
        Self { hooks }
    }

    pub fn builder() -> HookRegistryBuilder {
        HookRegistryBuilder::default()
    }

    /// Hooks for `state` in registration order; empty when none are registered.
    pub fn hooks_for(&self, state: WorkspaceState) -> &[Arc<dyn Hook>] {
        self.hooks.get(&state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of hooks across all states.
    pub fn len(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for state in WorkspaceState::ALL {
            let hooks = self.hooks_for(state);
            if !hooks.is_empty() {
                let names: Vec<&str> = hooks.iter().map(|h| h.name()).collect();
                map.entry(&state, &names);
            }
        }
        map.finish()
    }
}

#[derive(Default)]
pub struct HookRegistryBuilder {
    hooks: HashMap<WorkspaceState, Vec<Arc<dyn Hook>>>,
}

impl HookRegistryBuilder {
    /// Append `hook` to the hooks run on entering `state`.
    pub fn hook(mut self, state: WorkspaceState, hook: Arc<dyn Hook>) -> Self {
        self.hooks.entry(state).or_default().push(hook);
        self
    }

    pub fn build(self) -> HookRegistry {
        HookRegistry::new(self.hooks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> Arc<dyn Hook> {
        hook_fn(name, |_, _| Ok(()))
    }

    #[test]
    fn test_unregistered_state_is_empty() {
        let registry = HookRegistry::default();
        assert!(registry.hooks_for(WorkspaceState::Ready).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registration_order_preserved() {
        let registry = HookRegistry::builder()
            .hook(WorkspaceState::Initializing, noop("first"))
            .hook(WorkspaceState::Ready, noop("other"))
            .hook(WorkspaceState::Initializing, noop("second"))
            .build();

        let names: Vec<_> = registry
            .hooks_for(WorkspaceState::Initializing)
            .iter()
            .map(|h| h.name().to_string())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(registry.len(), 3);
        assert_eq!(
            format!("{registry:?}"),
            r#"{Initializing: ["first", "second"], Ready: ["other"]}"#
        );
    }

    #[tokio::test]
    async fn test_fn_hook_mutates_workspace() {
        let hook = hook_fn("annotate", |_, ws| {
            ws.annotate("seen", "yes");
            Ok(())
        });
        let mut ws = Workspace::new("inst-1", "", "", "/tmp/ws1");
        hook.run(&OpContext::background(), &mut ws).await.unwrap();
        assert_eq!(ws.annotation("seen"), Some("yes"));
    }
}
