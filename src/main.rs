//! tcpwatch Binary Entry Point
//!
//! Runs the complete tcpwatch monitoring process. Core functionality is
//! provided by the `tcpwatch` library crate.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tcpwatch::{
    config::AppConfig,
    monitor::Monitor,
    server::{AppState, create_router},
    storage::Database,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// tcpwatch - TCP reachability and latency monitor
#[derive(Parser, Debug)]
#[command(name = "tcpwatch", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "tcpwatch.yaml",
        env = "TCPWATCH_CONFIG"
    )]
    config: String,

    /// Server bind address (overrides config file)
    #[arg(long, env = "TCPWATCH_BIND")]
    bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "TCPWATCH_PORT")]
    port: Option<u16>,

    /// Database file path (overrides config file)
    #[arg(long, env = "TCPWATCH_DB")]
    db_path: Option<String>,

    /// Dataset to activate at startup (overrides config file)
    #[arg(long, env = "TCPWATCH_DATASET")]
    dataset: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tcpwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("tcpwatch - TCP reachability and latency monitor");

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration; a missing file falls back to defaults.
    let mut config = if std::path::Path::new(&cli.config).exists() {
        tracing::info!("Loading configuration from: {}", cli.config);
        AppConfig::load(&cli.config)?
    } else {
        tracing::info!("No config file at '{}', using defaults", cli.config);
        AppConfig::default()
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(db_path) = cli.db_path {
        config.database.path = db_path;
    }
    if let Some(dataset) = cli.dataset {
        config.dataset = Some(dataset);
    }
    config.validate()?;

    tracing::info!(
        "Server: {}:{}, Database: {}",
        config.server.bind,
        config.server.port,
        config.database.path,
    );

    // Build storage and the monitoring context
    let db =
        Database::connect_with_pool_size(&config.database_url(), config.database.pool_size).await?;
    let monitor = Arc::new(Monitor::new(db));

    if let Some(ref dataset) = config.dataset {
        monitor.switch(dataset).await?;
    }

    // Build Axum router
    let app = create_router(AppState {
        monitor: Arc::clone(&monitor),
    });

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Web server listening on: http://{}", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(monitor))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal(monitor: Arc<Monitor>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    tracing::info!("Stopping probers...");
    monitor.shutdown().await;

    tracing::info!("Closing database...");
    monitor.database().close().await;
}
