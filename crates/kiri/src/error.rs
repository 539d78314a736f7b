//! Application errors.

use kiri_config::ConfigError;
use kiri_ffi::FfiError;
use kiri_telemetry::TelemetryError;
use thiserror::Error;

/// Errors returned by [`App`](crate::App).
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Router or server setup failed.
    #[error(transparent)]
    Ffi(#[from] FfiError),

    /// Logging could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// Waiting for the shutdown signal failed.
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for application setup.
pub type AppResult<T> = Result<T, AppError>;
