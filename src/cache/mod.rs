pub mod metrics;
pub mod pipeline;
pub mod store;
pub mod watcher;

pub use metrics::ReloadMetrics;
pub use pipeline::{ReloadError, ReloadPipeline};
pub use store::{Snapshot, SnapshotStore};
pub use watcher::{FileWatcher, PollOutcome, WatcherHandle, DEFAULT_POLL_INTERVAL};
