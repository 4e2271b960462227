#![forbid(unsafe_code)]

//! `agent-chronicle`: session lifecycle server binary.
//!
//! Loads configuration, opens the durable store, and serves the NDJSON
//! request protocol on stdin/stdout until EOF or a shutdown signal.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use agent_chronicle::config::GlobalConfig;
use agent_chronicle::persistence::db;
use agent_chronicle::persistence::sqlite_store::SqliteGraphStore;
use agent_chronicle::server;
use agent_chronicle::state::{AppState, Collaborators};
use agent_chronicle::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-chronicle", about = "Agent work-session server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Workspace root; overrides the configured default and `PROJECT_ROOT`.
    #[arg(long)]
    workspace: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("agent-chronicle bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = GlobalConfig::resolve(args.config.as_deref(), args.workspace.as_deref())?;
    let config = Arc::new(config);
    info!(root = %config.default_workspace_root().display(), "configuration loaded");

    let db = Arc::new(db::connect(&config.db_path()).await?);
    info!(path = %config.db_path().display(), "database connected");

    let store = Arc::new(SqliteGraphStore::new(db));
    let collaborators = Collaborators::from_config(&config, store)?;
    let state = AppState::build(Arc::clone(&config), collaborators)?;

    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    let signal_handle = tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_ct.cancel();
    });

    info!("server ready");
    let served = server::serve(&state, tokio::io::stdin(), tokio::io::stdout(), ct.clone()).await;
    if let Err(ref err) = served {
        error!(%err, "server stopped with error");
    }

    signal_handle.abort();
    info!(open_sessions = state.registry.len(), "agent-chronicle shut down");
    served
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
