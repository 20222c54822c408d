use std::future::Future;
use std::net::SocketAddr;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::cache::{ReloadMetrics, SnapshotStore};
use crate::core::HealthChecker;

/// `GET /items`, `GET /health` and `GET /metrics`.
pub fn routes(
    store: SnapshotStore,
    health: HealthChecker,
    metrics: ReloadMetrics,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let items = warp::path("items")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::any().map(move || store.clone()))
        .map(|store: SnapshotStore| {
            let snapshot = store.read();
            warp::reply::json(&snapshot.items())
        });

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::any().map(move || health.clone()))
        .and_then(|checker: HealthChecker| async move {
            let status = checker.get_status().await;
            Ok::<_, Rejection>(warp::reply::json(&status))
        });

    let metrics = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::any().map(move || metrics.clone()))
        .map(|metrics: ReloadMetrics| match metrics.render() {
            Ok(body) => warp::reply::with_status(body, StatusCode::OK),
            Err(e) => {
                tracing::error!("Failed to render metrics: {}", e);
                warp::reply::with_status(String::new(), StatusCode::INTERNAL_SERVER_ERROR)
            }
        });

    items.or(health).or(metrics)
}

/// Bind and serve until `shutdown` resolves.
pub fn serve(
    store: SnapshotStore,
    health: HealthChecker,
    metrics: ReloadMetrics,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, impl Future<Output = ()>), warp::Error> {
    warp::serve(routes(store, health, metrics)).try_bind_with_graceful_shutdown(addr, shutdown)
}
