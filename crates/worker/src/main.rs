//! Standalone processing worker.
//!
//! Runs the task dispatcher against the shared PostgreSQL queue without
//! serving HTTP. Start any number of these next to API servers running with
//! `EMBEDDED_WORKER=false`.

mod config;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidintel_db::store::{PgVideoStore, VideoStore};
use vidintel_pipeline::analyzer::AnalyzerSet;
use vidintel_pipeline::dispatcher::{DispatcherConfig, TaskDispatcher};
use vidintel_pipeline::processor::{ProcessorConfig, VideoProcessor};
use vidintel_pipeline::service::VideoService;

use crate::config::WorkerConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidintel_worker=debug,vidintel_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    let pool = vidintel_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    vidintel_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    let store: Arc<dyn VideoStore> = Arc::new(PgVideoStore::new(pool));
    let service = VideoService::new(store);
    let processor = VideoProcessor::new(
        service.clone(),
        AnalyzerSet::from_env(),
        ProcessorConfig::from_env(),
    );
    let dispatcher = TaskDispatcher::new(
        service.tasks().clone(),
        Arc::new(processor),
        service.wake_handle(),
        DispatcherConfig::from_env(),
    );

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { dispatcher.run(cancel).await }
    });

    shutdown_signal().await;
    cancel.cancel();

    if tokio::time::timeout(shutdown_timeout, handle).await.is_err() {
        tracing::warn!("In-flight processing did not finish in time; leased tasks will be redelivered");
    }
    tracing::info!("Worker stopped");
}

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
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
