//! Dispatch metrics.
//!
//! Recording goes through the `metrics` facade, so every function here is a
//! no-op until a recorder is installed. [`init_metrics`] installs a
//! Prometheus recorder whose text output is available from
//! [`render_metrics`]; applications that already run their own recorder can
//! skip it.
//!
//! # Example
//!
//! ```rust,ignore
//! use kiri_telemetry::metrics::{record_dispatch, DispatchOutcome, InFlightGuard};
//!
//! let _guard = InFlightGuard::new();
//! record_dispatch(DispatchOutcome::Completed, started.elapsed());
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use ::metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Dispatch counter name.
pub const DISPATCH_TOTAL: &str = "kiri_dispatch_total";

/// Dispatch latency histogram name.
pub const REQUEST_DURATION_SECONDS: &str = "kiri_request_duration_seconds";

/// In-flight gauge name.
pub const IN_FLIGHT_REQUESTS: &str = "kiri_in_flight_requests";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether a recorder should be installed.
    pub enabled: bool,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // 1ms .. 10s
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// How a dispatched request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler chain returned a response.
    Completed,
    /// The chain failed with a structured HTTP error.
    HttpError,
    /// The peer cancelled the request.
    Cancelled,
    /// The chain failed with an unhandled error or panicked.
    Failed,
    /// Dispatch answered before running a chain (bad frame, unknown route).
    Rejected,
}

impl DispatchOutcome {
    /// Returns the metric label for this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::HttpError => "http_error",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }
}

/// Installs the Prometheus recorder.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if the buckets are invalid or a
/// global recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();
    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if [`init_metrics`] has not installed a recorder.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(DISPATCH_TOTAL, "Requests dispatched by terminal outcome");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        "Time from dispatch to the terminal action, in seconds"
    );
    describe_gauge!(IN_FLIGHT_REQUESTS, "Requests currently running a handler chain");
}

/// Records a finished dispatch.
pub fn record_dispatch(outcome: DispatchOutcome, duration: Duration) {
    counter!(DISPATCH_TOTAL, "outcome" => outcome.as_str()).increment(1);
    histogram!(REQUEST_DURATION_SECONDS, "outcome" => outcome.as_str())
        .record(duration.as_secs_f64());
}

/// Records a request answered before any chain ran.
pub fn record_rejected() {
    counter!(DISPATCH_TOTAL, "outcome" => DispatchOutcome::Rejected.as_str()).increment(1);
}

/// Guard that keeps the in-flight gauge raised while alive.
///
/// The gauge is lowered on drop, including during unwinding.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Raises the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT_REQUESTS).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_REQUESTS).decrement(1.0);
    }
}
