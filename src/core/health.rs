use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cache::Snapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub source: String,
    pub reload: ReloadStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReloadStatus {
    pub reload_count: u64,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_outcome: Option<String>,
    pub last_error: Option<String>,
    pub item_count: usize,
    pub generation: u64,
}

impl ReloadStatus {
    pub fn is_healthy(&self) -> bool {
        self.last_outcome.as_deref() == Some("ok")
    }
}

/// Reload bookkeeping for the health endpoint. Written by the watcher only;
/// never consulted on the snapshot read path.
#[derive(Clone)]
pub struct HealthChecker {
    start_time: std::time::Instant,
    source: String,
    status: Arc<RwLock<ReloadStatus>>,
}

impl HealthChecker {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            start_time: std::time::Instant::now(),
            source: source.into(),
            status: Arc::new(RwLock::new(ReloadStatus::default())),
        }
    }

    pub async fn get_status(&self) -> HealthStatus {
        let reload = self.status.read().await.clone();

        HealthStatus {
            status: if reload.is_healthy() {
                "healthy".to_string()
            } else {
                "degraded".to_string()
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            source: self.source.clone(),
            reload,
        }
    }

    pub async fn record_success(&self, snapshot: &Snapshot) {
        let mut status = self.status.write().await;
        status.reload_count += 1;
        status.last_attempt = Some(snapshot.published_at());
        status.last_success = Some(snapshot.published_at());
        status.last_outcome = Some("ok".to_string());
        status.last_error = None;
        status.item_count = snapshot.len();
        status.generation = snapshot.generation();
    }

    pub async fn record_failure(&self, outcome: &str, error: &str, snapshot: &Snapshot) {
        let mut status = self.status.write().await;
        status.reload_count += 1;
        status.last_attempt = Some(snapshot.published_at());
        status.last_outcome = Some(outcome.to_string());
        status.last_error = Some(error.to_string());
        status.item_count = snapshot.len();
        status.generation = snapshot.generation();
    }
}
