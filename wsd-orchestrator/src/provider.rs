use crate::error::{OrchestratorError, Result};
use crate::factory::WorkspaceFactory;
use crate::hooks::HookRegistry;
use crate::locks::InstanceLocks;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, trace, Span};
use wsd_core::trace::traced;
use wsd_core::{OpContext, Owi, WorkspaceState};
use wsd_session::{SessionError, SessionStore, Workspace};

/// Creates workspaces, drives them through their lifecycle and keeps their
/// session records on disk.
///
/// Every transition follows the same discipline: run the hooks registered
/// for the target state in order, and only when all of them succeed persist
/// the new state. A failed or canceled transition leaves the stored record
/// exactly as it was. All operations on one instance id are serialized.
#[derive(Clone)]
pub struct WorkspaceProvider {
    hooks: Arc<HookRegistry>,
    store: Arc<SessionStore>,
    locks: Arc<InstanceLocks>,
}

impl WorkspaceProvider {
    pub fn new(hooks: HookRegistry, store: SessionStore) -> Self {
        Self {
            hooks: Arc::new(hooks),
            store: Arc::new(store),
            locks: Arc::new(InstanceLocks::new()),
        }
    }

    /// A provider with a different hook registry, sharing this one's store
    /// and instance locks. Operations already running keep the registry
    /// they started with.
    pub fn with_hooks(&self, hooks: HookRegistry) -> Self {
        Self {
            hooks: Arc::new(hooks),
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
        }
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Create a workspace for `instance_id` at `location`.
    ///
    /// The factory's error is returned unchanged and no hooks run. Hooks are
    /// also skipped when the produced workspace cannot be stored, which is
    /// reported as `InvalidInput`. If an
    /// `initializing` hook fails, later hooks are skipped and nothing is
    /// persisted; side effects of earlier hooks are not undone, so callers
    /// must treat any error as "no workspace exists".
    pub async fn create(
        &self,
        ctx: &OpContext,
        instance_id: &str,
        location: impl AsRef<Path>,
        factory: &dyn WorkspaceFactory,
    ) -> Result<Workspace> {
        let span = Owi::instance(instance_id).span("create");
        traced(
            span,
            self.create_inner(ctx, instance_id, location.as_ref(), factory),
        )
        .await
    }

    async fn create_inner(
        &self,
        ctx: &OpContext,
        instance_id: &str,
        location: &Path,
        factory: &dyn WorkspaceFactory,
    ) -> Result<Workspace> {
        validate_instance_id(instance_id)?;
        let _guard = self.locks.acquire(instance_id).await;

        let id = instance_id.to_string();
        if self.with_store(move |store| Ok(store.exists(&id))).await? {
            return Err(OrchestratorError::AlreadyExists(instance_id.to_string()));
        }

        let mut workspace = match ctx.run(factory.create(ctx, location)).await {
            Err(reason) => {
                return Err(OrchestratorError::Canceled {
                    instance_id: instance_id.to_string(),
                    state: Some(WorkspaceState::Initializing),
                    reason,
                })
            }
            Ok(Err(source)) => {
                return Err(OrchestratorError::FactoryFailed {
                    instance_id: instance_id.to_string(),
                    source,
                })
            }
            Ok(Ok(workspace)) => workspace,
        };

        if workspace.instance_id.is_empty() {
            workspace.instance_id = instance_id.to_string();
        } else if workspace.instance_id != instance_id {
            return Err(OrchestratorError::InvalidInput(format!(
                "factory produced instance '{}' while creating '{instance_id}'",
                workspace.instance_id
            )));
        }
        workspace.state = WorkspaceState::Initializing;
        workspace.owi().apply(&Span::current());
        // A record that can never be saved must fail before hooks run
        SessionStore::encode(&workspace)?;

        self.run_lifecycle_hooks(ctx, &mut workspace, WorkspaceState::Initializing)
            .await?;
        self.persist(&workspace).await?;

        info!(location = %workspace.location.display(), "workspace created");
        Ok(workspace)
    }

    /// Load the stored record for `instance_id`.
    pub async fn get(&self, ctx: &OpContext, instance_id: &str) -> Result<Workspace> {
        let span = Owi::instance(instance_id).span("get");
        traced(span, self.get_inner(ctx, instance_id)).await
    }

    async fn get_inner(&self, ctx: &OpContext, instance_id: &str) -> Result<Workspace> {
        validate_instance_id(instance_id)?;
        let _guard = self.locks.acquire(instance_id).await;
        let workspace = self.load(ctx, instance_id).await?;
        workspace.owi().apply(&Span::current());
        Ok(workspace)
    }

    /// Move a stored workspace to `target`, running that state's hooks.
    pub async fn transition(
        &self,
        ctx: &OpContext,
        instance_id: &str,
        target: WorkspaceState,
    ) -> Result<Workspace> {
        let span = Owi::instance(instance_id).span("transition");
        traced(span, self.advance(ctx, instance_id, target, None)).await
    }

    /// Mark a workspace as failed, recording `reason` on it.
    pub async fn fail(
        &self,
        ctx: &OpContext,
        instance_id: &str,
        reason: impl Into<String>,
    ) -> Result<Workspace> {
        let span = Owi::instance(instance_id).span("fail");
        let reason = reason.into();
        traced(
            span,
            self.advance(ctx, instance_id, WorkspaceState::Failed, Some(reason)),
        )
        .await
    }

    async fn advance(
        &self,
        ctx: &OpContext,
        instance_id: &str,
        target: WorkspaceState,
        failure: Option<String>,
    ) -> Result<Workspace> {
        validate_instance_id(instance_id)?;
        let _guard = self.locks.acquire(instance_id).await;

        let current = self.load(ctx, instance_id).await?;
        current.owi().apply(&Span::current());
        if !current.state.can_transition_to(target) {
            return Err(OrchestratorError::InvalidTransition {
                instance_id: instance_id.to_string(),
                from: current.state,
                to: target,
            });
        }

        // Hooks work on a copy; the stored record only changes on success
        let mut next = current.clone();
        next.state = target;
        if failure.is_some() {
            next.last_error = failure;
        }

        self.run_lifecycle_hooks(ctx, &mut next, target).await?;
        next.touch();
        self.persist(&next).await?;

        info!(from = %current.state, to = %target, "workspace transitioned");
        Ok(next)
    }

    /// Every workspace with a readable session record.
    pub async fn list(&self) -> Result<Vec<Workspace>> {
        let span = Owi::default().span("list");
        traced(span, self.with_store(|store| store.list())).await
    }

    /// Remove the record of a workspace that reached a terminal state.
    pub async fn dispose(&self, ctx: &OpContext, instance_id: &str) -> Result<()> {
        let span = Owi::instance(instance_id).span("dispose");
        traced(span, self.dispose_inner(ctx, instance_id)).await
    }

    async fn dispose_inner(&self, ctx: &OpContext, instance_id: &str) -> Result<()> {
        validate_instance_id(instance_id)?;
        let _guard = self.locks.acquire(instance_id).await;

        let current = self.load(ctx, instance_id).await?;
        current.owi().apply(&Span::current());
        if !current.state.is_terminal() {
            return Err(OrchestratorError::InvalidState {
                instance_id: instance_id.to_string(),
                state: current.state,
                reason: "only stopped or failed workspaces can be disposed".to_string(),
            });
        }
        if let Some(reason) = ctx.err() {
            return Err(OrchestratorError::Canceled {
                instance_id: instance_id.to_string(),
                state: None,
                reason,
            });
        }

        let id = instance_id.to_string();
        self.with_store(move |store| store.remove(&id)).await?;
        info!("workspace disposed");
        Ok(())
    }

    /// Run the hooks registered for `state` against `workspace`, in order.
    ///
    /// Stops at the first failure. The context is checked before each hook
    /// and raced against it, so cancellation aborts the rest of the sequence.
    async fn run_lifecycle_hooks(
        &self,
        ctx: &OpContext,
        workspace: &mut Workspace,
        state: WorkspaceState,
    ) -> Result<()> {
        let hooks = self.hooks.hooks_for(state);
        debug!(
            owner = %workspace.owner_id,
            workspace = %workspace.workspace_id,
            instance = %workspace.instance_id,
            %state,
            hooks = hooks.len(),
            "running lifecycle hooks"
        );

        for (hook_index, hook) in hooks.iter().enumerate() {
            let outcome = ctx.run(hook.run(ctx, workspace)).await;
            match outcome {
                Ok(Ok(())) => trace!(hook = hook.name(), hook_index, "hook finished"),
                Ok(Err(source)) => {
                    return Err(OrchestratorError::HookFailed {
                        instance_id: workspace.instance_id.clone(),
                        state,
                        hook_index,
                        hook: hook.name().to_string(),
                        source,
                    })
                }
                Err(reason) => {
                    return Err(OrchestratorError::Canceled {
                        instance_id: workspace.instance_id.clone(),
                        state: Some(state),
                        reason,
                    })
                }
            }
        }
        Ok(())
    }

    async fn load(&self, ctx: &OpContext, instance_id: &str) -> Result<Workspace> {
        let id = instance_id.to_string();
        match ctx.run(self.with_store(move |store| store.load(&id))).await {
            Ok(result) => result,
            Err(reason) => Err(OrchestratorError::Canceled {
                instance_id: instance_id.to_string(),
                state: None,
                reason,
            }),
        }
    }

    async fn persist(&self, workspace: &Workspace) -> Result<()> {
        let record = workspace.clone();
        self.with_store(move |store| store.save(&record)).await
    }

    /// Run blocking store I/O off the async workers.
    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&SessionStore) -> std::result::Result<T, SessionError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| OrchestratorError::Internal(format!("session store task failed: {e}")))?
            .map_err(OrchestratorError::from)
    }
}

fn validate_instance_id(instance_id: &str) -> Result<()> {
    SessionStore::validate_instance_id(instance_id).map_err(OrchestratorError::from)
}
