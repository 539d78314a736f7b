//! # Kiri Middleware
//!
//! Handler and middleware composition for the Kiri bridge.
//!
//! ```text
//! request → global middlewares → group middlewares → route middlewares → handler
//!                                                                          ↓
//! response ←───────────── (each middleware may observe or replace) ←───────┘
//! ```
//!
//! - [`Handler`] - the terminal stage, implemented by any async closure
//! - [`Middleware`] / [`Next`] - a stage and its continuation
//! - [`FnMiddleware`] - a middleware from a closure
//! - [`Pipeline`] - an ordered chain composed around a handler
//! - [`stages::LoggingMiddleware`] - request logging through `tracing`

#![doc(html_root_url = "https://docs.rs/kiri-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod handler;
pub mod middleware;
pub mod pipeline;
pub mod stages;

pub use handler::{BoxFuture, BoxedHandler, Handler};
pub use middleware::{BoxedMiddleware, FnMiddleware, Middleware, Next};
pub use pipeline::Pipeline;
pub use stages::LoggingMiddleware;
