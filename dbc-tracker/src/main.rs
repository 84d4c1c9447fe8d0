//! dbc-tracker - Main entry point
//!
//! Loads configuration, opens the database, starts the settlement scheduler
//! and serves the HTTP API until Ctrl+C / SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dbc_common::config::{load_config, CONFIG_ENV_VAR};
use dbc_common::{Clock, SystemClock};
use dbc_tracker::jobs::{Schedule, Scheduler, SettlementJob};
use dbc_tracker::{build_router, AppState};

/// Command-line arguments for dbc-tracker
#[derive(Parser, Debug)]
#[command(name = "dbc-tracker")]
#[command(about = "Daily challenge tracking service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "DBC_PORT")]
    port: Option<u16>,

    /// SQLite database file (overrides config file)
    #[arg(short, long, env = "DBC_DATABASE")]
    database: Option<PathBuf>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dbc_tracker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref(), CONFIG_ENV_VAR)
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }

    info!("Starting dbc-tracker on {}", config.bind_addr());
    info!("Database: {}", config.database_path.display());

    let pool = dbc_common::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::new(pool, Arc::clone(&clock));

    let mut scheduler = Scheduler::new(clock);
    if config.jobs.enabled {
        scheduler.register(
            Arc::new(SettlementJob::new(Arc::clone(&state.processor))),
            Schedule::DailyAt {
                hour: config.jobs.settlement_hour,
                minute: config.jobs.settlement_minute,
            },
            config.jobs.run_on_startup,
        );
        scheduler
            .start()
            .await
            .context("Failed to start scheduled jobs")?;
    } else {
        info!("Scheduled jobs disabled");
    }

    let app = build_router(state, Duration::from_secs(config.request_timeout_secs));

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .context("Failed to bind to address")?;
    info!("Listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    scheduler.shutdown();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
