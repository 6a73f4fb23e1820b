// Command dispatch

use crate::cli::Command;
use crate::factory::DirectoryFactory;
use anyhow::Result;
use serde_json::{json, Value};
use tracing::debug;
use wsd_core::OpContext;
use wsd_orchestrator::WorkspaceProvider;

/// Run one command and return what should be printed.
pub async fn execute(provider: &WorkspaceProvider, ctx: &OpContext, command: Command) -> Result<Value> {
    debug!("Executing command: {:?}", command);

    let output = match command {
        Command::Create {
            instance_id,
            location,
            owner,
            workspace,
        } => {
            let factory = DirectoryFactory::new(owner, workspace);
            let created = provider
                .create(ctx, &instance_id, location, &factory)
                .await?;
            serde_json::to_value(created)?
        }
        Command::Get { instance_id } => serde_json::to_value(provider.get(ctx, &instance_id).await?)?,
        Command::List => serde_json::to_value(provider.list().await?)?,
        Command::Transition { instance_id, state } => {
            serde_json::to_value(provider.transition(ctx, &instance_id, state).await?)?
        }
        Command::Fail {
            instance_id,
            reason,
        } => serde_json::to_value(provider.fail(ctx, &instance_id, reason).await?)?,
        Command::Dispose { instance_id } => {
            provider.dispose(ctx, &instance_id).await?;
            json!({ "disposed": instance_id })
        }
    };

    Ok(output)
}
