//! heirloomd — the Heirloom daemon.
//!
//! Opens the ledger database and serves the REST API.
//!
//! # Usage
//!
//! ```text
//! heirloomd serve --port 8080 --data-dir /var/lib/heirloom --max-versions 10
//! ```

mod config;

use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use heirloom_ledger::Ledger;
use heirloom_state::RedbStore;
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{DaemonConfig, LogConfig, LogFormat, ServeArgs};

#[derive(Parser)]
#[command(name = "heirloomd", about = "Heirloom deployment ledger daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the ledger REST API.
    Serve(ServeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => {
            let config = DaemonConfig::load(&args)?;
            init_tracing(&config.log);
            run_serve(config).await
        }
    }
}

fn init_tracing(log: &LogConfig) {
    let default_filter = if log.debug {
        "info,heirloomd=debug,heirloom=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run_serve(config: DaemonConfig) -> anyhow::Result<()> {
    info!("Heirloom daemon starting");

    std::fs::create_dir_all(&config.storage.data_dir)?;
    let db_path = config.db_path();
    let store = RedbStore::open(&db_path)?;
    info!(path = ?db_path, "ledger store opened");

    info!(
        max_versions = config.ledger.max_versions,
        default_actor = %config.ledger.default_actor,
        "ledger configured"
    );
    let ledger = Ledger::new(store, config.ledger.clone())
        .with_span(info_span!("ledger", db = %db_path.display()));

    let router = heirloom_api::build_router(ledger);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Heirloom daemon stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
