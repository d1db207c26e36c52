use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use image_forge::app;
use image_forge::config::settings::AppConfig;
use image_forge::infrastructure::db::pool::{connect_to_db, run_migrations};
use image_forge::infrastructure::queue::rabbitmq::RabbitMqService;
use image_forge::infrastructure::storage::s3::StorageService;
use image_forge::processing::{backend_for, JobProcessor, ProcessExecutor, ScratchDir};
use image_forge::state::AppState;
use image_forge::workers::image_worker::start_image_worker;
use image_forge::workers::pool::WorkerPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting server...");

    let config = AppConfig::new()?;

    let db = connect_to_db(&config.database_url, 10)
        .await
        .context("Failed to connect to PostgreSQL")?;
    run_migrations(&db).await.context("Failed to run migrations")?;

    let storage = StorageService::new(
        &config.minio_url,
        &config.minio_bucket,
        &config.minio_access_key,
        &config.minio_secret_key,
    )
    .await;

    let queue = RabbitMqService::new(&config.rabbitmq_url).await?;

    let state = AppState::new(config.clone(), db, storage.clone(), queue.clone());

    let processing = &config.processing;
    let backend = backend_for(processing.tool, processing.tool_binary.clone());
    let processor = JobProcessor::new(
        Arc::new(state.jobs.clone()),
        Arc::new(storage),
        Arc::new(ProcessExecutor::new(processing.tool_timeout)),
        backend,
        ScratchDir::new(processing.work_dir.clone()),
    );
    let (pool, _workers) = WorkerPool::start(processor, processing.worker_concurrency);

    tokio::spawn(async move {
        if let Err(e) = start_image_worker(queue, pool).await {
            error!("❌ Image worker stopped: {:#}", e);
        }
    });

    let app = app::create_app(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
