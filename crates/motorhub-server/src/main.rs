mod config;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use motorhub_api::AppStateInner;
use motorhub_chat::{BlockingPolicy, ChatCoordinator, ChatStats, ModerationReportBuilder, TracingNotifier};
use motorhub_db::Database;
use motorhub_files::{FileDedupStore, FsBlobStore, LocalFileCache, run_reconcile_loop};
use motorhub_gateway::{Dispatcher, MessageChannel};

use crate::config::Config;

const DEFAULT_LOG_FILTER: &str = "motorhub=debug,motorhub_api=debug,motorhub_chat=debug,motorhub_files=debug,motorhub_gateway=debug,motorhub_db=info,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let config = Config::from_env()?;

    // Shared store and this device's download ledger
    let db = Arc::new(Database::open(&config.db_path)?);
    let device_db = Arc::new(Database::open(&config.device_db_path)?);

    let blobs = Arc::new(FsBlobStore::new(config.blob_dir.clone(), config.blob_base_url.clone()).await?);
    let files = Arc::new(FileDedupStore::new(db.clone(), blobs));
    let cache = Arc::new(LocalFileCache::new(files.clone(), device_db, config.media_dir.clone()));

    let dispatcher = Dispatcher::with_capacity(config.channel_capacity);
    let channel = MessageChannel::new(db.clone(), dispatcher.clone());
    let stats = Arc::new(ChatStats::new());

    let chat = Arc::new(ChatCoordinator::new(
        channel.clone(),
        BlockingPolicy::new(db.clone()),
        files.clone(),
        cache.clone(),
        Arc::new(TracingNotifier),
        stats.clone(),
    ));
    let reports = Arc::new(ModerationReportBuilder::new(Arc::new(channel), db, stats));

    // Background sweep of the local media cache
    tokio::spawn(run_reconcile_loop(cache, config.reconcile_secs));

    let state = Arc::new(AppStateInner {
        chat,
        reports,
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = motorhub_api::router(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("MotorHub chat server listening on {}", addr);
    info!("Media cache at {}, reconciled every {}s", config.media_dir.display(), config.reconcile_secs);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Ends every live subscription so WebSocket tasks wind down
    dispatcher.shutdown();
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
