//! Observability for the Kiri bridge.
//!
//! - **Logging**: `tracing-subscriber` initialisation with JSON or pretty output
//! - **Metrics**: dispatch counters, gauges and histograms via the `metrics` crate
//!
//! Library crates only emit events. Nothing is recorded or printed until the
//! application calls [`init_logging`] and, optionally, [`init_metrics`].
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `kiri_dispatch_total` | Counter | `outcome` | Dispatched requests by terminal outcome |
//! | `kiri_request_duration_seconds` | Histogram | `outcome` | Time from dispatch to terminal action |
//! | `kiri_in_flight_requests` | Gauge | - | Requests currently running a chain |
//!
//! # Example
//!
//! ```rust,no_run
//! use kiri_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development()).expect("logging");
//! tracing::info!(port = 8080, "starting");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use self::metrics::{init_metrics, render_metrics, DispatchOutcome, InFlightGuard, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
