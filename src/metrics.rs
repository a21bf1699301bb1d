//! Prometheus metrics for cache behavior.
//!
//! Counters cover the read path (hit/miss plus failure reasons), refresh
//! outcomes per mode, lock contention, and invalidations. Keys are never used
//! as label values; per-tenant cardinality belongs in logs, not metrics.

use prometheus::{
    Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use tracing::error;

pub struct Metrics {
    pub registry: Registry,

    /// Read outcomes: "hit" | "miss"
    pub reads_total: CounterVec,
    /// Why a read degraded to a miss: "store_error" | "decode_error" | "checksum_mismatch"
    pub read_failures_total: CounterVec,
    /// Refresh outcomes by mode ("background" | "sync") and outcome
    /// ("success" | "skipped" | "error")
    pub refreshes_total: CounterVec,
    pub refresh_duration_seconds: Histogram,
    pub lock_contention_total: Counter,
    pub invalidations_total: Counter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reads_total = CounterVec::new(
            Opts::new("muninn_cache_reads_total", "Cache reads by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(reads_total.clone()))?;

        let read_failures_total = CounterVec::new(
            Opts::new(
                "muninn_cache_read_failures_total",
                "Reads degraded to misses, by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(read_failures_total.clone()))?;

        let refreshes_total = CounterVec::new(
            Opts::new(
                "muninn_cache_refreshes_total",
                "Refresh attempts by mode and outcome",
            ),
            &["mode", "outcome"],
        )?;
        registry.register(Box::new(refreshes_total.clone()))?;

        let refresh_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "muninn_cache_refresh_duration_seconds",
                "Refresh duration including producer time",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(refresh_duration_seconds.clone()))?;

        let lock_contention_total = Counter::with_opts(Opts::new(
            "muninn_cache_lock_contention_total",
            "Refresh attempts that found the lock already held",
        ))?;
        registry.register(Box::new(lock_contention_total.clone()))?;

        let invalidations_total = Counter::with_opts(Opts::new(
            "muninn_cache_invalidations_total",
            "Explicit cache invalidations",
        ))?;
        registry.register(Box::new(invalidations_total.clone()))?;

        Ok(Self {
            registry,
            reads_total,
            read_failures_total,
            refreshes_total,
            refresh_duration_seconds,
            lock_contention_total,
            invalidations_total,
        })
    }

    pub fn record_read(&self, outcome: &str) {
        self.reads_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_read_failure(&self, reason: &str) {
        self.read_failures_total.with_label_values(&[reason]).inc();
    }

    pub fn record_refresh(&self, mode: &str, outcome: &str, duration_secs: f64) {
        self.refreshes_total
            .with_label_values(&[mode, outcome])
            .inc();
        self.refresh_duration_seconds.observe(duration_secs);
    }

    pub fn record_lock_contention(&self) {
        self.lock_contention_total.inc();
    }

    pub fn record_invalidation(&self) {
        self.invalidations_total.inc();
    }

    /// Render metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        match encoder.encode_to_string(&metric_families) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "Failed to encode metrics");
                String::new()
            }
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

/// Shared metrics instance
pub type SharedMetrics = Arc<Metrics>;

/// Create a shared metrics instance
pub fn create_metrics() -> SharedMetrics {
    Arc::new(Metrics::default())
}
