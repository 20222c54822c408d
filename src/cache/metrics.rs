use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;

use super::store::Snapshot;

#[derive(Clone)]
pub struct ReloadMetrics {
    registry: Registry,
    reloads: IntCounterVec,
    snapshot_items: IntGauge,
    snapshot_generation: IntGauge,
    reload_duration: Histogram,
}

impl ReloadMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reloads = IntCounterVec::new(
            Opts::new("auction_reloads_total", "Reload attempts by outcome"),
            &["outcome"],
        )?;
        let snapshot_items = IntGauge::new(
            "auction_snapshot_items",
            "Items in the currently published snapshot",
        )?;
        let snapshot_generation = IntGauge::new(
            "auction_snapshot_generation",
            "Generation of the currently published snapshot",
        )?;
        let reload_duration = Histogram::with_opts(
            HistogramOpts::new(
                "auction_reload_duration_seconds",
                "Time spent reading, decoding and selecting auction data",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(reloads.clone()))?;
        registry.register(Box::new(snapshot_items.clone()))?;
        registry.register(Box::new(snapshot_generation.clone()))?;
        registry.register(Box::new(reload_duration.clone()))?;

        Ok(Self {
            registry,
            reloads,
            snapshot_items,
            snapshot_generation,
            reload_duration,
        })
    }

    pub fn record_reload(&self, outcome: &str, elapsed: Duration, snapshot: &Snapshot) {
        self.reloads.with_label_values(&[outcome]).inc();
        self.reload_duration.observe(elapsed.as_secs_f64());
        self.snapshot_items.set(snapshot.len() as i64);
        self.snapshot_generation.set(snapshot.generation() as i64);
    }

    pub fn reload_count(&self, outcome: &str) -> u64 {
        self.reloads.with_label_values(&[outcome]).get()
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
