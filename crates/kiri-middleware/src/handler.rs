//! Request handlers.

use kiri_core::{HandlerResult, Request};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The terminal stage of a chain: turns a request into a response.
///
/// Any `async` closure `Fn(Request) -> impl Future<Output = HandlerResult>`
/// is a handler:
///
/// ```
/// use kiri_core::{Request, Response};
/// use kiri_middleware::{BoxedHandler, Handler};
/// use std::sync::Arc;
///
/// let hello: BoxedHandler = Arc::new(|_req: Request| async { Ok(Response::ok("hello")) });
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Handles one request.
    fn call(&self, request: Request) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, request: Request) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(request))
    }
}

/// A shared, type-erased handler.
pub type BoxedHandler = Arc<dyn Handler>;

#[cfg(test)]
mod tests {
    use super::*;
    use kiri_core::{CancellationToken, HttpError, HttpMethod, Response};

    fn request(path: &str) -> Request {
        Request::new(HttpMethod::Get, path, "", CancellationToken::never())
    }

    #[tokio::test]
    async fn test_closure_is_handler() {
        let handler: BoxedHandler =
            Arc::new(|req: Request| async move { Ok(Response::ok(req.path().to_owned())) });

        let response = handler.call(request("/echo")).await.unwrap();
        assert_eq!(response.text(), Some("/echo"));
    }

    #[tokio::test]
    async fn test_handler_error_passes_through() {
        let handler: BoxedHandler =
            Arc::new(|_req: Request| async { Err(HttpError::new(404, "nope").into()) });

        let err = handler.call(request("/")).await.unwrap_err();
        assert_eq!(err.into_response().status(), 404);
    }
}
