use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidintel_api::config::{ServerConfig, StoreBackend};
use vidintel_api::router::build_app_router;
use vidintel_api::state::AppState;
use vidintel_db::store::{MemoryVideoStore, PgVideoStore, VideoStore};
use vidintel_pipeline::analyzer::AnalyzerSet;
use vidintel_pipeline::dispatcher::{DispatcherConfig, TaskDispatcher};
use vidintel_pipeline::processor::{ProcessorConfig, VideoProcessor};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vidintel_api=debug,vidintel_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        store = ?config.store_backend,
        "Loaded server configuration",
    );

    // --- Entity store ---
    let store: Arc<dyn VideoStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

            let pool = vidintel_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            vidintel_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            vidintel_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgVideoStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            Arc::new(MemoryVideoStore::new())
        }
    };

    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let embedded_worker = config.embedded_worker;
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );

    let state = AppState::new(store, config);

    // --- Background processing ---
    let dispatch_cancel = CancellationToken::new();
    let dispatch_handle = embedded_worker.then(|| {
        let processor = VideoProcessor::new(
            state.service.clone(),
            AnalyzerSet::from_env(),
            ProcessorConfig::from_env(),
        );
        let dispatcher = TaskDispatcher::new(
            state.service.tasks().clone(),
            Arc::new(processor),
            state.service.wake_handle(),
            DispatcherConfig::from_env(),
        );
        let cancel = dispatch_cancel.clone();
        tokio::spawn(async move { dispatcher.run(cancel).await })
    });
    if dispatch_handle.is_none() {
        tracing::info!("Embedded worker disabled, processing is left to vidintel-worker");
    }

    // --- Start server ---
    let app = build_app_router(state);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    dispatch_cancel.cancel();
    if let Some(handle) = dispatch_handle {
        if tokio::time::timeout(shutdown_timeout, handle).await.is_err() {
            tracing::warn!(
                "In-flight processing did not finish in time; leased tasks will be redelivered"
            );
        }
        tracing::info!("Task dispatcher stopped");
    }

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
