//! Service metrics.
//!
//! Counters are kept locally for the JSON metrics API and also reported
//! through the `metrics` facade for the Prometheus exporter.

use metrics::counter;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Metrics collector for the WFS API.
#[derive(Debug)]
pub struct WfsMetrics {
    requests: AtomicU64,
    request_errors: AtomicU64,
    cursors_created: AtomicU64,
    cursor_loads: AtomicU64,
    cursor_errors: AtomicU64,
    cursors_expired: AtomicU64,
    start_time: Instant,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub requests: u64,
    pub request_errors: u64,
    pub cursors_created: u64,
    pub cursor_loads: u64,
    pub cursor_errors: u64,
    pub cursors_expired: u64,
}

impl Default for WfsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WfsMetrics {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            request_errors: AtomicU64::new(0),
            cursors_created: AtomicU64::new(0),
            cursor_loads: AtomicU64::new(0),
            cursor_errors: AtomicU64::new(0),
            cursors_expired: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a WFS request by operation name
    pub fn record_request(&self, operation: &'static str) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        counter!("wfs_requests_total", "operation" => operation).increment(1);
    }

    /// Record a request answered with an exception report
    pub fn record_request_error(&self, code: &'static str) {
        self.request_errors.fetch_add(1, Ordering::Relaxed);
        counter!("wfs_request_errors_total", "code" => code).increment(1);
    }

    pub fn record_cursor_created(&self) {
        self.cursors_created.fetch_add(1, Ordering::Relaxed);
        counter!("wfs_cursors_created_total").increment(1);
    }

    pub fn record_cursor_load(&self) {
        self.cursor_loads.fetch_add(1, Ordering::Relaxed);
        counter!("wfs_cursor_loads_total").increment(1);
    }

    /// Record a failed cursor operation (`create` or `load`)
    pub fn record_cursor_error(&self, operation: &'static str) {
        self.cursor_errors.fetch_add(1, Ordering::Relaxed);
        counter!("wfs_cursor_errors_total", "operation" => operation).increment(1);
    }

    pub fn record_cursors_expired(&self, count: u64) {
        self.cursors_expired.fetch_add(count, Ordering::Relaxed);
        counter!("wfs_cursors_expired_total").increment(count);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            request_errors: self.request_errors.load(Ordering::Relaxed),
            cursors_created: self.cursors_created.load(Ordering::Relaxed),
            cursor_loads: self.cursor_loads.load(Ordering::Relaxed),
            cursor_errors: self.cursor_errors.load(Ordering::Relaxed),
            cursors_expired: self.cursors_expired.load(Ordering::Relaxed),
        }
    }
}
