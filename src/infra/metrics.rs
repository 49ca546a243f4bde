//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//!
//! NOTE: All atomics use Relaxed ordering intentionally—these are statistical
//! counters only. Do NOT use these atomics for coordination or logic
//! decisions; the scanner's state machine is the source of truth.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Lock-free metrics collector for the scanner and lookup pipeline.
#[derive(Default)]
pub struct Metrics {
    detections_total: AtomicU64,
    detections_empty: AtomicU64,
    detections_deduped: AtomicU64,
    detections_off_center: AtomicU64,
    detections_stale: AtomicU64,
    lookups_started: AtomicU64,
    lookups_not_found: AtomicU64,
    lookups_failed: AtomicU64,
    products_resolved: AtomicU64,
    streams_acquired: AtomicU64,
    streams_released: AtomicU64,
    sessions_started: AtomicU64,
    sessions_stopped: AtomicU64,
    sessions_failed: AtomicU64,
    lookup_latency_sum_us: AtomicU64,
    lookup_latency_count: AtomicU64,
    lookup_latency_max_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_detection(&self) {
        self.detections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection_empty(&self) {
        self.detections_empty.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection_deduped(&self) {
        self.detections_deduped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection_off_center(&self) {
        self.detections_off_center.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection_stale(&self) {
        self.detections_stale.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lookup_started(&self) {
        self.lookups_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lookup_not_found(&self) {
        self.lookups_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lookup_failed(&self) {
        self.lookups_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_product_resolved(&self) {
        self.products_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_acquired(&self) {
        self.streams_acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_released(&self) {
        self.streams_released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_stopped(&self) {
        self.sessions_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lookup_latency(&self, latency_us: u64) {
        self.lookup_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.lookup_latency_count.fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.lookup_latency_max_us, latency_us);
    }

    pub fn streams_acquired(&self) -> u64 {
        self.streams_acquired.load(Ordering::Relaxed)
    }

    pub fn streams_released(&self) -> u64 {
        self.streams_released.load(Ordering::Relaxed)
    }

    pub fn detections_deduped(&self) -> u64 {
        self.detections_deduped.load(Ordering::Relaxed)
    }

    pub fn lookups_started(&self) -> u64 {
        self.lookups_started.load(Ordering::Relaxed)
    }

    pub fn products_resolved(&self) -> u64 {
        self.products_resolved.load(Ordering::Relaxed)
    }

    /// Consistent-enough snapshot for periodic reporting.
    pub fn summary(&self) -> MetricsSummary {
        let latency_count = self.lookup_latency_count.load(Ordering::Relaxed);
        let latency_sum = self.lookup_latency_sum_us.load(Ordering::Relaxed);
        MetricsSummary {
            detections_total: self.detections_total.load(Ordering::Relaxed),
            detections_empty: self.detections_empty.load(Ordering::Relaxed),
            detections_deduped: self.detections_deduped.load(Ordering::Relaxed),
            detections_off_center: self.detections_off_center.load(Ordering::Relaxed),
            detections_stale: self.detections_stale.load(Ordering::Relaxed),
            lookups_started: self.lookups_started.load(Ordering::Relaxed),
            lookups_not_found: self.lookups_not_found.load(Ordering::Relaxed),
            lookups_failed: self.lookups_failed.load(Ordering::Relaxed),
            products_resolved: self.products_resolved.load(Ordering::Relaxed),
            streams_acquired: self.streams_acquired.load(Ordering::Relaxed),
            streams_released: self.streams_released.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_stopped: self.sessions_stopped.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            avg_lookup_latency_us: if latency_count > 0 { latency_sum / latency_count } else { 0 },
            max_lookup_latency_us: self.lookup_latency_max_us.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricsSummary {
    pub detections_total: u64,
    pub detections_empty: u64,
    pub detections_deduped: u64,
    pub detections_off_center: u64,
    pub detections_stale: u64,
    pub lookups_started: u64,
    pub lookups_not_found: u64,
    pub lookups_failed: u64,
    pub products_resolved: u64,
    pub streams_acquired: u64,
    pub streams_released: u64,
    pub sessions_started: u64,
    pub sessions_stopped: u64,
    pub sessions_failed: u64,
    pub avg_lookup_latency_us: u64,
    pub max_lookup_latency_us: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            detections_total = self.detections_total,
            detections_empty = self.detections_empty,
            detections_deduped = self.detections_deduped,
            detections_off_center = self.detections_off_center,
            detections_stale = self.detections_stale,
            lookups_started = self.lookups_started,
            lookups_not_found = self.lookups_not_found,
            lookups_failed = self.lookups_failed,
            products_resolved = self.products_resolved,
            streams_acquired = self.streams_acquired,
            streams_released = self.streams_released,
            sessions_started = self.sessions_started,
            sessions_stopped = self.sessions_stopped,
            sessions_failed = self.sessions_failed,
            avg_lookup_latency_us = self.avg_lookup_latency_us,
            max_lookup_latency_us = self.max_lookup_latency_us,
            "metrics_summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_detection();
        metrics.record_detection();
        metrics.record_detection_deduped();
        metrics.record_lookup_started();
        metrics.record_product_resolved();

        let summary = metrics.summary();
        assert_eq!(summary.detections_total, 2);
        assert_eq!(summary.detections_deduped, 1);
        assert_eq!(summary.lookups_started, 1);
        assert_eq!(summary.products_resolved, 1);
    }

    #[test]
    fn test_lookup_latency_stats() {
        let metrics = Metrics::new();
        metrics.record_lookup_latency(100);
        metrics.record_lookup_latency(300);

        let summary = metrics.summary();
        assert_eq!(summary.avg_lookup_latency_us, 200);
        assert_eq!(summary.max_lookup_latency_us, 300);
    }

    #[test]
    fn test_stream_balance_counters() {
        let metrics = Metrics::new();
        metrics.record_stream_acquired();
        metrics.record_stream_released();

        assert_eq!(metrics.streams_acquired(), metrics.streams_released());
    }
}
