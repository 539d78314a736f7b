//! Request logging middleware.
//!
//! Logs method and path before continuing, then the status (or the error)
//! and the elapsed time once the rest of the chain has finished.
//!
//! ```rust,ignore
//! use kiri_middleware::stages::LoggingMiddleware;
//!
//! router.use_middleware(LoggingMiddleware::new());
//! ```

use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use kiri_core::{HandlerError, HandlerResult, Request};
use std::time::Instant;

/// Logs every request passing through it with `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware {
    _private: (),
}

impl LoggingMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let method = request.method();
            let path = request.path().to_owned();
            let start = Instant::now();

            tracing::info!(http.method = %method, http.path = %path, "request started");

            let result = next.run(request).await;
            let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

            match &result {
                Ok(response) => tracing::info!(
                    http.method = %method,
                    http.path = %path,
                    http.status_code = response.status(),
                    duration_ms,
                    "request completed"
                ),
                Err(HandlerError::Cancelled(_)) => tracing::debug!(
                    http.method = %method,
                    http.path = %path,
                    duration_ms,
                    "request cancelled"
                ),
                Err(err) => tracing::warn!(
                    http.method = %method,
                    http.path = %path,
                    error = %err,
                    duration_ms,
                    "request failed"
                ),
            }

            result
        })
    }
}
