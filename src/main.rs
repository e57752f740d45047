//! Study Artifacts Server
//!
//! Generates summaries, flashcard decks and quizzes from stored documents
//! through an external text-generation service, and caches every artifact so
//! that each one is generated at most once.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use study_artifacts_server::config::Config;
use study_artifacts_server::state::AppState;
use study_artifacts_server::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "study_artifacts_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    tracing::info!("Starting Study Artifacts Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Generation provider: {} (model {}, timeout {}s)",
        config.generation.provider.as_str(),
        config.generation.model,
        config.generation.timeout().as_secs()
    );

    // Initialize database
    let db_pool = db::create_pool(&config.database.url)
        .await
        .context("Failed to initialize database")?;
    tracing::info!("Database initialized at {}", config.database.url);

    // Create application state
    let app_state =
        AppState::new(config, db_pool).context("Failed to initialize application state")?;

    if app_state.artifacts().generation_available().await {
        tracing::info!("Generation service reachable");
    } else {
        tracing::warn!("Generation service not reachable, artifact requests will fail until it is");
    }

    let host: std::net::IpAddr = app_state
        .config()
        .server
        .host
        .parse()
        .context("Invalid SERVER_HOST")?;
    let addr = SocketAddr::from((host, app_state.config().server.port));

    let app = routes::app(app_state);

    // Start server with graceful shutdown
    tracing::info!("Study Artifacts Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
