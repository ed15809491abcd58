//! Board-watch CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: [`WatchConfig`] and [`MondayConfig`] from the
//!    environment, failing before any network traffic.
//! 2. **Wire observability**: `tracing-subscriber` with an `EnvFilter`, a human
//!    or JSON formatter, and an optional OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: one [`MondayClient`] serving both ports,
//!    wrapped in a [`RemoteHandle`] with the configured token.
//! 4. **Run**: hydrate the workspace, promote the configured board to an input
//!    board with a [`ForwardingHandler`] per watched group, start it, and stop
//!    gracefully on Ctrl-C.

mod config;
mod handler;
mod telemetry;

use std::sync::Arc;

use anyhow::{anyhow, Context};
use monday::{MondayClient, MondayConfig};
use tracing::{info, warn};
use workspace::{ExecutionMapping, RemoteHandle, StopMode, Workspace};

use crate::config::WatchConfig;
use crate::handler::ForwardingHandler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let telemetry = telemetry::init()?;
    let result = run().await;
    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "board-watch failed");
    }
    telemetry.shutdown();
    result
}

async fn run() -> anyhow::Result<()> {
    let config = WatchConfig::from_env().context("reading watch configuration")?;
    let monday = MondayConfig::from_env().context("reading monday configuration")?;
    let client = Arc::new(MondayClient::new(monday)?);
    let remote = RemoteHandle::from_client(config.token.clone(), client);

    let mut workspace = Workspace::connect(&config.workspace, remote.clone())
        .await
        .with_context(|| format!("connecting to workspace '{}'", config.workspace))?;

    let board = workspace.board(&config.board).ok_or_else(|| {
        anyhow!("board '{}' not found in workspace '{}'", config.board, config.workspace)
    })?;
    for title in &config.groups {
        if board.group(title).is_none() {
            warn!(board = %config.board, group = %title, "watched group does not exist; it will be ignored");
        }
    }
    let target = match &config.forward_group {
        Some(title) => Some(
            board
                .group(title)
                .map(|g| g.id().clone())
                .ok_or_else(|| anyhow!("forward group '{title}' not found on board '{}'", config.board))?,
        ),
        None => None,
    };

    let handler = ForwardingHandler::new(remote, board.id().clone(), target);
    let mapping = config
        .groups
        .iter()
        .fold(ExecutionMapping::new(), |mapping, title| mapping.on_group(title.clone(), handler.clone()));

    let input = workspace
        .promote_to_input_board(&config.board, mapping, config.input_board.clone())
        .await
        .with_context(|| format!("promoting board '{}'", config.board))?;
    input.start()?;
    info!(
        board = %config.board,
        groups = ?config.groups,
        interval_ms = config.input_board.poll_interval.as_duration().as_millis(),
        "watching for new items; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("stopping");
    input.stop(StopMode::Graceful).await?;
    input.wait_for_handlers().await;

    let stats = input.stats();
    info!(
        dispatched = stats.dispatched,
        succeeded = stats.succeeded,
        failed = stats.failed,
        panicked = stats.panicked,
        "stopped"
    );
    Ok(())
}
