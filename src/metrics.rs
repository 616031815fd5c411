//! Prometheus metrics for the dispatch core.
//!
//! - `relaybot_lines_dispatched_total{trigger}` - Lines dispatched by trigger key
//! - `relaybot_handler_duration_seconds{handler}` - Handler latency histogram
//! - `relaybot_job_failures_total{job, error}` - Failed jobs by error code
//! - `relaybot_job_retries_total{job}` - Declined jobs put back on their queue
//! - `relaybot_pool_workers` - Current THREADSAFE pool size
//! - `relaybot_pool_events_total{event}` - Pool growth, stall replacement, idle retirement
//! - `relaybot_lines_sent_total` - Protocol lines written to the socket

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

pub static LINES_DISPATCHED: OnceLock<IntCounterVec> = OnceLock::new();

pub static JOB_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

pub static JOB_RETRIES: OnceLock<IntCounterVec> = OnceLock::new();

pub static POOL_EVENTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Protocol lines successfully written by the printer.
pub static LINES_SENT: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Gauges and histograms
// ========================================================================

pub static POOL_WORKERS: OnceLock<IntGauge> = OnceLock::new();

pub static HANDLER_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Recording before `init()` is a no-op, so library users that never call it
/// pay nothing.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                let m = $init.expect(concat!(stringify!($metric), " creation failed"));
                if let Err(e) = r.register(Box::new(m.clone())) {
                    tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                }
                let _ = $metric.set(m);
            }
        };
    }

    register!(LINES_DISPATCHED, IntCounterVec::new(Opts::new("relaybot_lines_dispatched_total", "Lines dispatched by trigger key"), &["trigger"]));
    register!(JOB_FAILURES, IntCounterVec::new(Opts::new("relaybot_job_failures_total", "Failed jobs by error code"), &["job", "error"]));
    register!(JOB_RETRIES, IntCounterVec::new(Opts::new("relaybot_job_retries_total", "Declined jobs requeued"), &["job"]));
    register!(POOL_EVENTS, IntCounterVec::new(Opts::new("relaybot_pool_events_total", "Worker pool rebalancing events"), &["event"]));
    register!(LINES_SENT, IntCounter::new("relaybot_lines_sent_total", "Protocol lines written to the socket"));
    register!(POOL_WORKERS, IntGauge::new("relaybot_pool_workers", "THREADSAFE pool size"));
    register!(HANDLER_LATENCY, HistogramVec::new(
        HistogramOpts::new("relaybot_handler_duration_seconds", "Handler latency by handler")
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["handler"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

#[inline]
pub fn record_line_dispatched(trigger: &str) {
    if let Some(c) = LINES_DISPATCHED.get() {
        c.with_label_values(&[trigger]).inc();
    }
}

#[inline]
pub fn record_handler(handler: &str, duration_secs: f64) {
    if let Some(h) = HANDLER_LATENCY.get() {
        h.with_label_values(&[handler]).observe(duration_secs);
    }
}

#[inline]
pub fn record_job_failure(job: &str, error: &str) {
    if let Some(c) = JOB_FAILURES.get() {
        c.with_label_values(&[job, error]).inc();
    }
}

#[inline]
pub fn record_job_retry(job: &str) {
    if let Some(c) = JOB_RETRIES.get() {
        c.with_label_values(&[job]).inc();
    }
}

/// Record a pool event: `grown`, `stalled` or `idle_retired`.
#[inline]
pub fn record_pool_event(event: &str) {
    if let Some(c) = POOL_EVENTS.get() {
        c.with_label_values(&[event]).inc();
    }
}

#[inline]
pub fn set_pool_workers(count: usize) {
    if let Some(g) = POOL_WORKERS.get() {
        g.set(count as i64);
    }
}

#[inline]
pub fn record_line_sent() {
    if let Some(c) = LINES_SENT.get() {
        c.inc();
    }
}
