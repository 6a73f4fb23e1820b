use async_trait::async_trait;
use std::path::Path;
use wsd_core::OpContext;
use wsd_session::Workspace;

/// Materializes a workspace's initial footprint at `location`.
///
/// The orchestrator calls a factory at most once per `create` and never
/// retries it. The returned workspace may leave `instance_id` empty; the
/// orchestrator fills in the id it was asked to create.
#[async_trait]
pub trait WorkspaceFactory: Send + Sync {
    async fn create(&self, ctx: &OpContext, location: &Path) -> anyhow::Result<Workspace>;
}

/// Factory backed by a synchronous closure.
pub struct FnFactory<F>(F);

impl<F> FnFactory<F>
where
    F: Fn(&OpContext, &Path) -> anyhow::Result<Workspace> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> WorkspaceFactory for FnFactory<F>
where
    F: Fn(&OpContext, &Path) -> anyhow::Result<Workspace> + Send + Sync,
{
    async fn create(&self, ctx: &OpContext, location: &Path) -> anyhow::Result<Workspace> {
        (self.0)(ctx, location)
    }
}
