//! # Kiri
//!
//! **Rust handlers for the Kiri native HTTP engine**
//!
//! The native engine owns sockets, HTTP parsing and route matching. Kiri
//! runs your handlers: each request crosses the C boundary as a binary
//! frame, runs through the middleware chain on a Tokio runtime, and is
//! answered exactly once.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kiri::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AppError> {
//!     let app = App::native(8080)?;
//!     app.use_middleware(Arc::new(LoggingMiddleware::new()));
//!     app.get("/", |_req: Request| async { Ok(Response::ok("hello")) });
//!     app.run().await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! libkiri ── kiri_dispatch ──▶ Dispatcher ──▶ globals → group → route → handler
//!    ▲                                                                  │
//!    └────────────── response frame (or release if cancelled) ◀────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/kiri/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod error;

pub use app::App;
pub use error::{AppError, AppResult};

// Re-export core types
pub use kiri_core as core;

// Re-export bridge types
pub use kiri_ffi as ffi;

// Re-export middleware types
pub use kiri_middleware as middleware;

// Re-export configuration types
pub use kiri_config as config;

// Re-export telemetry types
pub use kiri_telemetry as telemetry;

/// Installs logging as described by the `[logging]` section.
pub fn init_telemetry(config: &kiri_config::KiriConfig) -> AppResult<()> {
    kiri_telemetry::init_logging(&config.logging.to_log_config())?;
    Ok(())
}

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use kiri::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{App, AppError, AppResult};

    pub use kiri_core::{
        CancellationToken, Cancelled, HandlerError, HandlerResult, HttpError, HttpMethod,
        Request, Response,
    };

    pub use kiri_middleware::{
        BoxFuture, BoxedMiddleware, FnMiddleware, Handler, LoggingMiddleware, Middleware, Next,
    };

    pub use kiri_ffi::{Engine, Phase, RouteGroup, RouteId, Router, Server};

    #[cfg(feature = "native")]
    pub use kiri_ffi::NativeEngine;

    pub use kiri_config::{ConfigLoader, KiriConfig};

    pub use std::sync::Arc;
}
