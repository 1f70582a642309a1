use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use swapline::api::{create_router, AppState};
use swapline::config::AppConfig;
use swapline::error::Result;
use swapline::events::Broadcaster;
use swapline::persistence::{MemoryStatusSink, PostgresStatusSink, StatusSink};
use swapline::pipeline::OrderPipeline;
use swapline::provider::MockDexRouter;
use swapline::queue::{JobQueue, JobStore, MemoryJobStore, PostgresJobStore};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = AppConfig::load()?;
    info!(
        workers = config.queue.workers,
        max_attempts = config.queue.max_attempts,
        "starting swapline"
    );

    let (sink, job_store): (Arc<dyn StatusSink>, Arc<dyn JobStore>) =
        match &config.database.url {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.database.max_connections)
                    .connect(url)
                    .await?;
                let sink = PostgresStatusSink::new(pool.clone());
                sink.init_schema().await?;
                let job_store = PostgresJobStore::new(pool);
                job_store.init_schema().await?;
                info!("connected to postgres status sink and job store");
                (Arc::new(sink), Arc::new(job_store))
            }
            None => {
                warn!("no database.url configured, using in-memory status sink and job store");
                (
                    Arc::new(MemoryStatusSink::new()),
                    Arc::new(MemoryJobStore::new()),
                )
            }
        };

    let broadcaster = Broadcaster::new(Duration::from_secs(config.events.history_grace_secs));
    let provider = Arc::new(MockDexRouter::new(&config.provider));
    let pipeline = Arc::new(OrderPipeline::new(
        provider,
        Arc::clone(&broadcaster),
        sink,
        config.provider.stage_timeout_ms,
    ));
    let queue = JobQueue::start(
        config.queue.clone(),
        pipeline,
        Arc::clone(&broadcaster),
        job_store,
    );

    let recovered = queue.pending_jobs().await?;
    if !recovered.is_empty() {
        info!(count = recovered.len(), "re-dispatching jobs left pending by a previous run");
        for job in recovered {
            if let Err(e) = queue.submit(job.order).await {
                warn!("failed to re-dispatch recovered job: {e}");
            }
        }
    }

    let state = AppState::new(Arc::clone(&queue), broadcaster);
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down, draining worker pool");
    queue.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,swapline=debug,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
