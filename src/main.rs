use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rostr::config::Config;
use rostr::AppState;

#[derive(Parser, Debug)]
#[command(name = "rostr")]
#[command(author, version, about = "Membership management for student associations", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "rostr.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rostr v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data directory exists
    rostr::utils::ensure_dir(&config.server.data_dir)?;

    // Initialize database
    let db = rostr::db::init(&config.server.data_dir).await?;

    // Ensure the bootstrap admin account exists
    rostr::api::auth::ensure_admin_user(&db, &config.auth).await?;

    // Create app state and API router
    let state = Arc::new(AppState::new(config.clone(), db));
    let api_router = rostr::api::create_router(state);

    // Serve the pre-built frontend with SPA fallback
    let static_dir = config.server.static_dir.clone();
    let index_file = static_dir.join("index.html");
    let serve_static = ServeDir::new(&static_dir).not_found_service(ServeFile::new(&index_file));

    // Combine routers - API first, then static files as fallback
    let app = axum::Router::new()
        .merge(api_router)
        .fallback_service(serve_static);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Operator API token: {}", config.auth.api_token);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
