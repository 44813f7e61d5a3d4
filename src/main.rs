use anyhow::Context;
use dotenvy::dotenv;
use futures_util::future::join_all;
use tracing::info;
use tracing_subscriber::EnvFilter;

use video_editor_backend::config::settings::AppConfig;
use video_editor_backend::infrastructure::media::transform::TransformTable;
use video_editor_backend::infrastructure::storage::chunk_store::ChunkStore;
use video_editor_backend::modules::jobs::model::PipelineKind;
use video_editor_backend::state::AppState;
use video_editor_backend::{app, workers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    info!("Starting server...");

    let config = AppConfig::new();
    let store = ChunkStore::new(&config.storage_dir)
        .await
        .with_context(|| format!("Failed to create storage dir {}", config.storage_dir.display()))?;
    let transforms = TransformTable::from_config(&config);
    let state = AppState::new(config.clone(), store, transforms);

    let mut worker_handles = Vec::new();
    for kind in PipelineKind::ALL {
        let count = config.workers_for(kind);
        info!("Spawning {} {} worker(s)", count, kind);
        worker_handles.extend(state.dispatcher.spawn_workers(kind, count));
    }
    let reaper = tokio::spawn(workers::reaper::start_reaper(state.clone()));

    let app = app::create_app(state.clone());

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Draining job queues...");
    reaper.abort();
    state.dispatcher.close();
    join_all(worker_handles).await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
