use anyhow::{Context, Result};
use auction_snapshot::cache::{FileWatcher, ReloadMetrics, ReloadPipeline, SnapshotStore};
use auction_snapshot::core::{logging, Config, HealthChecker};
use auction_snapshot::server;
use auction_snapshot::source::FileSource;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    logging::init_logging(&config.monitoring.log_level);

    tracing::info!("🚀 Auction snapshot service starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Auction data: {}", config.source.path.display());

    let store = SnapshotStore::new();
    let health = HealthChecker::new(config.source.path.display().to_string());
    let metrics = ReloadMetrics::new().context("failed to register reload metrics")?;

    let watcher = FileWatcher::new(
        ReloadPipeline::new(FileSource::new(&config.source.path)),
        store.clone(),
        health.clone(),
        metrics.clone(),
        config.source.poll_interval(),
    );
    let watcher_handle = watcher.spawn();

    let addr = config.server.socket_addr()?;
    let (bound, serving) = server::serve(store, health, metrics, addr, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("✅ Serving auction items on http://{}/items", bound);
    serving.await;

    tracing::info!("Shutting down...");
    watcher_handle.shutdown().await;

    Ok(())
}
