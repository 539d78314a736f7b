//! Core middleware trait and types.
//!
//! A [`Middleware`] receives the request and a [`Next`] continuation. It may
//! rewrite the request, short-circuit with its own response, inspect or
//! replace the downstream response, or catch and translate downstream errors.
//!
//! # Example
//!
//! ```
//! use kiri_core::{Request, HandlerResult};
//! use kiri_middleware::{BoxFuture, Middleware, Next};
//!
//! struct Prefix;
//!
//! impl Middleware for Prefix {
//!     fn name(&self) -> &'static str {
//!         "prefix"
//!     }
//!
//!     fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, HandlerResult> {
//!         Box::pin(async move {
//!             let path = format!("/v1{}", request.path());
//!             next.run(request.with_path(path)).await
//!         })
//!     }
//! }
//! ```

use crate::handler::{BoxFuture, Handler};
use kiri_core::{HandlerResult, Request};
use std::sync::Arc;

/// The core middleware trait.
///
/// # Invariants
///
/// - `next` is consumed by [`Next::run`], so downstream runs at most once
/// - Not calling `next.run()` short-circuits the rest of the chain
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Processes the request, usually by calling `next.run(request)`.
    fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, HandlerResult>;
}

/// A shared, type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Continuation to the rest of the chain.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Handler(&'a dyn Handler),
}

impl<'a> Next<'a> {
    /// Wraps `next` with `middleware`.
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Terminal continuation that invokes the handler.
    pub(crate) fn handler(handler: &'a dyn Handler) -> Self {
        Self {
            inner: NextInner::Handler(handler),
        }
    }

    /// Runs the rest of the chain.
    ///
    /// Consumes `self`, so the rest of the chain runs at most once.
    pub async fn run(self, request: Request) -> HandlerResult {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.handle(request, *next).await,
            NextInner::Handler(handler) => handler.call(request).await,
        }
    }
}

/// A middleware built from a closure.
///
/// ```
/// use kiri_core::HttpError;
/// use kiri_middleware::FnMiddleware;
///
/// let auth = FnMiddleware::new("auth", |request, next| {
///     Box::pin(async move {
///         if request.body().is_empty() {
///             return Err(HttpError::new(401, "unauthorized").into());
///         }
///         next.run(request).await
///     })
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    /// Creates a closure middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, HandlerResult> {
        (self.func)(request, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::BoxedHandler;
    use kiri_core::{CancellationToken, HandlerError, HttpError, HttpMethod, Response};

    fn request(path: &str) -> Request {
        Request::new(HttpMethod::Get, path, "", CancellationToken::never())
    }

    fn echo() -> BoxedHandler {
        Arc::new(|req: Request| async move { Ok(Response::ok(req.path().to_owned())) })
    }

    #[tokio::test]
    async fn test_next_handler() {
        let handler = echo();
        let response = Next::handler(handler.as_ref())
            .run(request("/direct"))
            .await
            .unwrap();
        assert_eq!(response.text(), Some("/direct"));
    }

    #[tokio::test]
    async fn test_fn_middleware_rewrites_request() {
        let handler = echo();
        let mw = FnMiddleware::new("rewrite", |req, next| {
            Box::pin(async move { next.run(req.with_path("/rewritten")).await })
        });
        assert_eq!(mw.name(), "rewrite");

        let next = Next::new(&mw, Next::handler(handler.as_ref()));
        let response = next.run(request("/original")).await.unwrap();
        assert_eq!(response.text(), Some("/rewritten"));
    }

    #[tokio::test]
    async fn test_fn_middleware_translates_errors() {
        let failing: BoxedHandler =
            Arc::new(|_req: Request| async { Err(HandlerError::msg("storage down")) });
        let mw = FnMiddleware::new("translate", |req, next| {
            Box::pin(async move {
                match next.run(req).await {
                    Err(HandlerError::Other(_)) => Err(HttpError::new(503, "retry later").into()),
                    other => other,
                }
            })
        });

        let next = Next::new(&mw, Next::handler(failing.as_ref()));
        let err = next.run(request("/")).await.unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), 503);
        assert_eq!(response.text(), Some("retry later"));
    }
}
