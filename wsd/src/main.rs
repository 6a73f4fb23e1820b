// External crates
use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

// Internal imports
use wsd_core::OpContext;
use wsd_orchestrator::WorkspaceProvider;
use wsd_session::SessionStore;

// Local modules
mod cli;
mod commands;
mod config;
mod factory;
mod hooks;

use cli::Args;
use config::WsdConfig;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only command output
    let _log_guard = match wsd_logging::init_subscriber("warn") {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: failed to initialize logging: {e}");
            None
        }
    };

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = WsdConfig::load(args.config.as_deref())?;
    let session_dir = config.session_dir();
    info!(session_dir = %session_dir.display(), "Loaded configuration");

    let provider = WorkspaceProvider::new(config.hook_registry(), SessionStore::new(session_dir));

    let timeout = match args.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.timeout(),
    };
    let ctx = match timeout {
        Some(timeout) => OpContext::background().with_timeout(timeout),
        None => OpContext::background(),
    };

    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, canceling operation");
            interrupt.cancel();
        }
    });

    let output = commands::execute(&provider, &ctx, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
