use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use storyboard_api::config::ServerConfig;
use storyboard_api::router::build_app_router;
use storyboard_api::state::AppState;
use storyboard_cloud::{AssetStore, DisabledAssetStore, R2AssetStore};
use storyboard_imagegen::{HttpImageGenerator, ImageGenerator};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound on waiting for queued ordering batches after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "storyboard_api=debug,storyboard_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = storyboard_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    storyboard_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    storyboard_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Collaborators ---
    let images: Option<Arc<dyn ImageGenerator>> = match &config.image_api {
        Some(api) => {
            tracing::info!(url = %api.url, "Image generation enabled");
            Some(Arc::new(HttpImageGenerator::new(
                api.url.clone(),
                api.api_key.clone(),
            )))
        }
        None => {
            tracing::warn!("IMAGE_API_URL not set, builds requesting images will be rejected");
            None
        }
    };

    let assets: Arc<dyn AssetStore> = match &config.r2 {
        Some(r2) => {
            let store = R2AssetStore::new(r2).expect("Invalid R2 configuration");
            tracing::info!(bucket = %r2.bucket, "Asset store enabled");
            Arc::new(store)
        }
        None => {
            tracing::warn!("R2 not configured, asset deletes will be skipped");
            Arc::new(DisabledAssetStore)
        }
    };

    // --- App state ---
    let write_cancel = CancellationToken::new();
    let state = AppState::new(pool, config.clone(), images, assets, write_cancel.clone());
    let frames = Arc::clone(&state.frames);

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, draining ordering writes");

    // Workers finish what is already queued, then exit.
    write_cancel.cancel();
    let workers = frames.queue().worker_count();
    let _ = tokio::time::timeout(DRAIN_TIMEOUT, frames.queue().wait_stopped()).await;
    tracing::info!(workers, "Ordering write queue drained");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
