//! # Kiri FFI
//!
//! The bridge between the Kiri native HTTP engine and Rust handlers.
//!
//! The engine parses HTTP and matches routes. For each request it calls back
//! into Rust with a route id, a binary request frame, and two opaque
//! contexts: one to deliver the response through and one to poll for
//! cancellation.
//!
//! ```text
//! engine thread                          tokio worker
//! ─────────────                          ────────────
//! kiri_dispatch(id, frame, ctx, cctx)
//!   ├─ wrap ctx / cctx
//!   ├─ decode frame, look up route
//!   └─ spawn ──────────────────────────▶ globals → route middlewares → handler
//!                                          └─ complete(ctx) exactly once
//! ```
//!
//! The engine is modelled by the [`Engine`] trait. With the `native` feature,
//! [`NativeEngine`] links `libkiri` and exports the `kiri_dispatch` callback.
//!
//! ## Example
//!
//! ```rust,ignore
//! use kiri_ffi::{NativeEngine, Router, Server};
//! use kiri_core::Response;
//! use std::sync::Arc;
//!
//! let router = Arc::new(Router::new(NativeEngine::shared())?);
//! router.get("/", |_req| async { Ok(Response::ok("hello")) });
//!
//! let runtime = kiri_ffi::shared_runtime()?;
//! let server = Server::new(8080, router, runtime.handle().clone());
//! server.start()?;
//! ```

#![warn(missing_docs)]

pub mod cancellation;
pub mod completion;
pub mod dispatch;
pub mod engine;
pub mod error;
#[cfg(feature = "native")]
pub mod native;
pub mod registry;
pub mod router;
pub mod runtime;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use cancellation::CancellationHandle;
pub use completion::{Completion, CompletionToken};
pub use dispatch::{DispatchError, Dispatcher};
pub use engine::{Engine, ForeignPtr};
pub use error::FfiError;
#[cfg(feature = "native")]
pub use native::NativeEngine;
pub use registry::{RouteEntry, RouteId, RouteRegistry};
pub use router::{Phase, RouteGroup, Router};
pub use runtime::{build_runtime, shared_runtime, RuntimeConfig};
pub use server::Server;
