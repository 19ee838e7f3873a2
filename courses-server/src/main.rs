//! Collaborative grocery list server - main entry point

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courses_common::config;
use courses_common::db::init_database;
use courses_server::api::{self, AppState};
use courses_server::auth::{AccessGate, TokenGate};
use courses_server::rooms::RoomRegistry;
use courses_server::services::llm_client::{Classifier, LlmClient};
use courses_server::services::section_assigner::SectionAssigner;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "courses-server")]
#[command(about = "Collaborative grocery list server")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8450", env = "COURSES_PORT")]
    port: u16,

    /// Database file (overrides config file and environment)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, env = "COURSES_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courses_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config =
        config::load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(db_path) = args.db_path {
        config.database_path = db_path;
    }

    info!("Starting courses-server on port {}", args.port);
    info!("Database: {}", config.database_path.display());
    if config.llm.api_key.trim().is_empty() {
        info!("No LLM API key configured; classification uses keyword rules only");
    }

    let db = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let classifier: Arc<dyn Classifier> = Arc::new(LlmClient::new(config.llm.clone()));
    let assigner = Arc::new(SectionAssigner::new(db.clone(), classifier));
    let rooms = RoomRegistry::new(db.clone(), Arc::clone(&assigner));
    let gate: Arc<dyn AccessGate> = Arc::new(TokenGate::new(db.clone(), config.auth_required));

    let state = AppState {
        db,
        rooms,
        assigner,
        gate,
    };
    let app = api::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
