//! Test error types.

use kiri_core::{FrameError, HttpMethod};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while driving the bridge in tests.
#[derive(Debug, Error)]
pub enum TestError {
    /// No server is attached to the engine.
    #[error("no dispatcher attached; start a server first")]
    NotRunning,

    /// The mock engine has no route for the method and path.
    #[error("no route registered for {method} {path}")]
    NoRoute {
        /// Request method
        method: HttpMethod,
        /// Request path
        path: String,
    },

    /// The response frame did not decode.
    #[error("invalid response frame: {0}")]
    Frame(#[from] FrameError),

    /// The request never reached a terminal action.
    #[error("no terminal action within {0:?}")]
    Timeout(Duration),

    /// Response body reading failed
    #[error("body read error: {0}")]
    BodyRead(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
