use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::metrics::ReloadMetrics;
use super::pipeline::{ReloadError, ReloadPipeline};
use super::store::{Snapshot, SnapshotStore};
use crate::core::HealthChecker;
use crate::source::{AuctionSource, SourceError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Source does not exist right now; retried next cycle.
    Missing,
    /// Source could not be inspected; retried next cycle.
    Unreadable,
    Unchanged,
    Reloaded,
}

/// Polls the source modification time and republishes the snapshot whenever it changes.
///
/// The watcher is the only writer of its `SnapshotStore`. Every reload replaces
/// the snapshot, and a failed reload publishes an empty one.
pub struct FileWatcher<S> {
    pipeline: Arc<ReloadPipeline<S>>,
    store: SnapshotStore,
    health: HealthChecker,
    metrics: ReloadMetrics,
    interval: Duration,
    last_modified: Option<SystemTime>,
}

impl<S: AuctionSource> FileWatcher<S> {
    pub fn new(
        pipeline: ReloadPipeline<S>,
        store: SnapshotStore,
        health: HealthChecker,
        metrics: ReloadMetrics,
        interval: Duration,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            store,
            health,
            metrics,
            interval: interval.max(MIN_POLL_INTERVAL),
            last_modified: None,
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Record the current modification time and reload unconditionally.
    pub async fn start(&mut self) -> Arc<Snapshot> {
        self.last_modified = match self.current_mtime().await {
            Ok(Some(modified)) => Some(modified),
            Ok(None) => {
                warn!(
                    "⚠️  {} not found on initial load, snapshot will be empty",
                    self.pipeline.source().describe()
                );
                None
            }
            Err(e) => {
                warn!("⚠️  Failed to inspect auction data on initial load: {}", e);
                None
            }
        };

        self.reload().await
    }

    /// One polling cycle: reload only if the modification time changed.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let modified = match self.current_mtime().await {
            Ok(Some(modified)) => modified,
            Ok(None) => {
                debug!(
                    "⏳ {} not found, retrying next cycle",
                    self.pipeline.source().describe()
                );
                return PollOutcome::Missing;
            }
            Err(e) => {
                warn!("Failed to inspect auction data, retrying next cycle: {}", e);
                return PollOutcome::Unreadable;
            }
        };

        if self.last_modified == Some(modified) {
            return PollOutcome::Unchanged;
        }

        info!("📂 File change detected in {}", self.pipeline.source().describe());
        self.last_modified = Some(modified);
        self.reload().await;
        PollOutcome::Reloaded
    }

    // stat can block on slow or network filesystems, same as the read
    async fn current_mtime(&self) -> Result<Option<SystemTime>, SourceError> {
        let pipeline = self.pipeline.clone();
        match tokio::task::spawn_blocking(move || pipeline.source().modified()).await {
            Ok(result) => result,
            Err(e) => Err(SourceError::Unreadable {
                path: self.pipeline.source().describe(),
                source: io::Error::new(io::ErrorKind::Other, e.to_string()),
            }),
        }
    }

    /// Run the reload pipeline off the async workers and publish the result.
    pub async fn reload(&mut self) -> Arc<Snapshot> {
        debug!("🔄 Reloading auction data...");
        let pipeline = self.pipeline.clone();
        let started = Instant::now();

        let result = match tokio::task::spawn_blocking(move || pipeline.load()).await {
            Ok(result) => result,
            Err(e) => Err(ReloadError::Aborted(e.to_string())),
        };
        let elapsed = started.elapsed();

        match result {
            Ok(items) => {
                let snapshot = self.store.replace(items);
                info!(
                    "✅ Snapshot #{} published: {} items ({:.2}ms)",
                    snapshot.generation(),
                    snapshot.len(),
                    elapsed.as_secs_f64() * 1000.0
                );
                self.metrics.record_reload("ok", elapsed, &snapshot);
                self.health.record_success(&snapshot).await;
                snapshot
            }
            Err(e) => {
                match &e {
                    ReloadError::SourceMissing { .. } | ReloadError::Source(_) => {
                        warn!("⚠️  Auction data unavailable: {}", e)
                    }
                    ReloadError::Decode(_) | ReloadError::Aborted(_) => {
                        error!("❌ Reload failed: {}", e)
                    }
                }

                let snapshot = self.store.replace(Vec::new());
                warn!("Snapshot #{} cleared after failed reload", snapshot.generation());
                self.metrics.record_reload(e.outcome(), elapsed, &snapshot);
                self.health
                    .record_failure(e.outcome(), &e.to_string(), &snapshot)
                    .await;
                snapshot
            }
        }
    }

    /// Start the polling loop on the runtime. Stops when the handle is shut down or dropped.
    pub fn spawn(self) -> WatcherHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(self.run(stop_rx));
        WatcherHandle {
            stop_tx,
            handle: Some(handle),
        }
    }

    async fn run(mut self, mut stop_rx: watch::Receiver<bool>) {
        info!(
            "👀 Watching {} (poll every {:?})",
            self.pipeline.source().describe(),
            self.interval
        );

        self.start().await;

        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *stop_rx.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("🛑 Auction watcher stopped");
    }
}

/// Owner of a running watcher task.
pub struct WatcherHandle {
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    /// Signal the loop to stop after its current cycle and wait for it.
    pub async fn shutdown(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Auction watcher ended abnormally: {}", e);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}
