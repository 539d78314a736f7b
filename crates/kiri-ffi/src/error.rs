//! Bridge errors.

use thiserror::Error;

/// Errors returned by router and server setup.
#[derive(Debug, Error)]
pub enum FfiError {
    /// The engine could not allocate a route table.
    #[error("Failed to create router")]
    RouterCreate,

    /// The server did not start. Carries the engine's message.
    #[error("{0}")]
    Startup(String),

    /// The Tokio runtime could not be built.
    #[error("failed to build runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
