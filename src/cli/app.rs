use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gasoline_core_types::Warnings;
use gasoline_mcp::{McpServer, ServerInfo, DEFAULT_CLIENT_ID};
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::env::CliArgs;
use super::runtime::{init_logging, load_config, LoadedConfig};
use crate::daemon::{Daemon, VERSION};
use crate::server::{build_router, AppState};
use crate::state_dir::StateDir;
use crate::tools::GasolineTools;

const INSTRUCTIONS: &str = "Gasoline captures browser telemetry from the companion extension. \
Use `observe` to read console, network, websocket and action buffers, `analyze` for API contract \
and DOM checks, `generate` for a CSP, `configure` to clear buffers or manage noise rules, and \
`interact` to drive the page when AI Web Pilot is enabled.";

pub async fn run() -> Result<()> {
    let cli = match CliArgs::try_parse() {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    init_logging(&cli.log_level, cli.debug, cli.log_format)?;

    info!("Starting Gasoline v{}", VERSION);

    let LoadedConfig { mut config, path } = load_config(cli.config.as_ref()).await?;
    debug!(config = %path.display(), "configuration resolved");
    config.apply_overrides(cli.overrides());

    let warnings = Warnings::new();
    let state_dir = StateDir::resolve(&warnings);
    if config.log_store.path.is_none() {
        config.log_store.path = Some(state_dir.default_log_file());
    }
    let http_port = config.server.http_port;

    let daemon = Arc::new(
        Daemon::build(config, state_dir, warnings).context("Failed to initialize daemon")?,
    );
    let tools = GasolineTools::new(daemon.clone());
    let mcp = Arc::new(McpServer::new(
        ServerInfo::new("gasoline", VERSION).with_instructions(INSTRUCTIONS),
        Arc::new(tools),
    ));
    let sweeper = daemon.queries().spawn_sweeper();
    let cancel = CancellationToken::new();

    let http = if http_port == 0 {
        info!("HTTP listener disabled");
        None
    } else {
        Some(spawn_http(http_port, AppState::new(daemon.clone(), mcp.clone()), cancel.clone()).await?)
    };

    if cli.no_stdio {
        info!("stdio transport disabled; press Ctrl-C to stop");
        wait_for_ctrl_c().await;
    } else {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        tokio::select! {
            served = gasoline_mcp::stdio::serve_lines(mcp.clone(), stdin, stdout, DEFAULT_CLIENT_ID, cancel.clone()) => {
                match served {
                    Ok(handled) => info!(handled, "stdin closed"),
                    Err(err) => error!(?err, "stdio transport failed"),
                }
            }
            _ = wait_for_ctrl_c() => {}
        }
    }

    info!("Shutting down");
    cancel.cancel();
    mcp.shutdown_token().cancel();
    if let Some(http) = http {
        match http.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(?err, "HTTP server stopped with an error"),
            Err(err) => warn!(?err, "HTTP server task failed"),
        }
    }
    if let Err(err) = sweeper.shutdown().await {
        warn!(?err, "query sweeper did not stop cleanly");
    }
    let closing = daemon.clone();
    if let Err(err) = tokio::task::spawn_blocking(move || closing.shutdown()).await {
        warn!(?err, "log store shutdown task failed");
    }
    info!("Gasoline stopped");
    Ok(())
}

async fn spawn_http(
    port: u16,
    state: AppState,
    cancel: CancellationToken,
) -> Result<JoinHandle<std::io::Result<()>>> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind extension server on {}", addr))?;
    info!("Extension endpoint listening on http://{}", addr);
    let router = build_router(state);
    Ok(tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
    }))
}

async fn wait_for_ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
