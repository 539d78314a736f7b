//! The per-request entry point called by the engine.
//!
//! Dispatch runs on an engine thread and must return quickly. It wraps both
//! contexts, decodes the frame, and resolves the route synchronously; the
//! middleware chain then runs as its own Tokio task. Every path, including
//! a panicking handler, ends in exactly one terminal action on the
//! completion context.

use crate::cancellation::CancellationHandle;
use crate::completion::{Completion, CompletionToken};
use crate::engine::{Engine, ForeignPtr};
use crate::registry::{RouteId, RouteRegistry};
use futures_util::FutureExt;
use kiri_core::{CancellationToken, FrameCodec, HandlerError, Request, Response};
use kiri_middleware::Pipeline;
use kiri_telemetry::metrics::{record_dispatch, record_rejected};
use kiri_telemetry::{DispatchOutcome, InFlightGuard};
use std::any::Any;
use std::ffi::c_void;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::runtime::Handle;

/// Requests rejected before any handler runs. All answer with a `500`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Null or empty request buffer.
    #[error("bad request frame")]
    BadFrame,
    /// The request frame did not decode.
    #[error("cannot decode request")]
    Decode,
    /// No route has the given id.
    #[error("missing handler")]
    MissingRoute,
    /// The engine called back while no dispatcher was attached.
    #[error("no dispatcher attached")]
    NoDispatcher,
}

impl DispatchError {
    /// Converts this error into the response sent to the peer.
    pub fn into_response(self) -> Response {
        Response::internal_server_error(self.to_string())
    }
}

/// Runs requests for one router on a Tokio runtime.
pub struct Dispatcher<E: Engine> {
    engine: Arc<E>,
    registry: Arc<RouteRegistry>,
    runtime: Handle,
    codec: FrameCodec,
}

impl<E: Engine> Dispatcher<E> {
    /// Creates a dispatcher reading routes from `registry`.
    pub fn new(engine: Arc<E>, registry: Arc<RouteRegistry>, runtime: Handle) -> Self {
        Self::with_codec(engine, registry, runtime, FrameCodec::new())
    }

    /// Creates a dispatcher that decodes with `codec`.
    pub fn with_codec(
        engine: Arc<E>,
        registry: Arc<RouteRegistry>,
        runtime: Handle,
        codec: FrameCodec,
    ) -> Self {
        Self {
            engine,
            registry,
            runtime,
            codec,
        }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Returns the frame codec.
    pub fn codec(&self) -> FrameCodec {
        self.codec
    }

    /// Handles one inbound request.
    ///
    /// # Safety
    ///
    /// `request` must be null or point to `len` readable bytes for the
    /// duration of this call. `completion` and `cancellation` must each be
    /// null or a live context that the caller hands over to this function.
    pub unsafe fn dispatch(
        &self,
        route_id: RouteId,
        request: *const u8,
        len: usize,
        completion: *mut c_void,
        cancellation: *mut c_void,
    ) {
        let started = Instant::now();
        let completion = CompletionToken::new(
            self.engine.clone(),
            self.codec,
            ForeignPtr::from_raw(completion),
        );
        let cancellation = Arc::new(CancellationHandle::new(
            self.engine.clone(),
            ForeignPtr::from_raw(cancellation),
        ));

        if request.is_null() || len == 0 {
            reject(route_id, DispatchError::BadFrame, &completion, &cancellation);
            return;
        }
        let bytes = std::slice::from_raw_parts(request, len);

        let frame = match self.codec.decode_request(bytes) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(route_id, error = %err, "request frame rejected");
                reject(route_id, DispatchError::Decode, &completion, &cancellation);
                return;
            }
        };

        let Some(entry) = self.registry.entry(route_id) else {
            reject(route_id, DispatchError::MissingRoute, &completion, &cancellation);
            return;
        };

        let middlewares = self
            .registry
            .global_middlewares()
            .into_iter()
            .chain(entry.middlewares().iter().cloned())
            .collect();
        let pipeline = Pipeline::new(middlewares, entry.handler().clone());
        let request = Request::from_frame(frame, CancellationToken::new(cancellation.clone()));

        self.runtime.spawn(async move {
            let _in_flight = InFlightGuard::new();
            let result = AssertUnwindSafe(pipeline.run(request)).catch_unwind().await;
            let (response, outcome) = settle(route_id, result);
            if completion.complete(response, &cancellation) == Completion::Released
                && outcome != DispatchOutcome::Cancelled
            {
                tracing::debug!(route_id, "request abandoned by peer");
            }
            record_dispatch(outcome, started.elapsed());
        });
    }
}

impl<E: Engine> fmt::Debug for Dispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

/// Answers a request that never reached a handler.
pub(crate) fn reject<E: Engine>(
    route_id: RouteId,
    error: DispatchError,
    completion: &CompletionToken<E>,
    cancellation: &CancellationHandle<E>,
) {
    tracing::warn!(route_id, error = %error, "dispatch rejected");
    completion.complete(error.into_response(), cancellation);
    record_rejected();
}

fn settle(
    route_id: RouteId,
    result: Result<kiri_core::HandlerResult, Box<dyn Any + Send>>,
) -> (Response, DispatchOutcome) {
    match result {
        Ok(Ok(response)) => (response, DispatchOutcome::Completed),
        Ok(Err(HandlerError::Cancelled(_))) => {
            tracing::debug!(route_id, "handler observed cancellation");
            (Response::client_closed_request(), DispatchOutcome::Cancelled)
        }
        Ok(Err(err @ HandlerError::Http(_))) => (err.into_response(), DispatchOutcome::HttpError),
        Ok(Err(err)) => {
            tracing::warn!(route_id, error = %err, "handler failed");
            (err.into_response(), DispatchOutcome::Failed)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::warn!(route_id, error = %message, "handler panicked");
            (
                Response::internal_server_error(format!("Caught unhandled error: {message}")),
                DispatchOutcome::Failed,
            )
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Ctx, Event, RecordingEngine};
    use kiri_core::{Cancelled, HttpError, HttpMethod};
    use kiri_middleware::FnMiddleware;
    use parking_lot::Mutex;

    struct Fixture {
        engine: Arc<RecordingEngine>,
        registry: Arc<RouteRegistry>,
        dispatcher: Dispatcher<RecordingEngine>,
    }

    fn fixture() -> Fixture {
        let engine = RecordingEngine::new();
        let registry = Arc::new(RouteRegistry::new());
        let dispatcher = Dispatcher::new(engine.clone(), registry.clone(), Handle::current());
        Fixture {
            engine,
            registry,
            dispatcher,
        }
    }

    impl Fixture {
        fn send(&self, route_id: RouteId, frame: &[u8]) -> (Ctx, Ctx) {
            let completion = self.engine.new_context();
            let cancellation = self.engine.new_context();
            self.send_with(route_id, frame, completion, cancellation);
            (completion, cancellation)
        }

        fn send_with(&self, route_id: RouteId, frame: &[u8], completion: Ctx, cancellation: Ctx) {
            unsafe {
                self.dispatcher.dispatch(
                    route_id,
                    frame.as_ptr(),
                    frame.len(),
                    completion.raw(),
                    cancellation.raw(),
                );
            }
        }

        async fn response(&self, completion: Ctx) -> Response {
            match self.engine.terminal(completion).await {
                Event::Completed(_, frame) => FrameCodec::new().decode_response(&frame).unwrap(),
                other => panic!("expected a response, got {other:?}"),
            }
        }
    }

    fn get(path: &str) -> Vec<u8> {
        FrameCodec::new().encode_request(HttpMethod::Get, path, b"")
    }

    #[tokio::test]
    async fn test_handler_response_is_sent() {
        let f = fixture();
        let id = f.registry.register(
            Arc::new(|_req: Request| async { Ok(Response::ok("ok")) }),
            vec![],
        );

        let (ctx, _) = f.send(id, &get("/"));
        let response = f.response(ctx).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text(), Some("ok"));
    }

    #[tokio::test]
    async fn test_request_fields_reach_handler() {
        let f = fixture();
        let id = f.registry.register(
            Arc::new(|req: Request| async move {
                Ok(Response::ok(format!(
                    "{} {} {}",
                    req.method(),
                    req.path(),
                    String::from_utf8_lossy(req.body())
                )))
            }),
            vec![],
        );

        let frame = FrameCodec::new().encode_request(HttpMethod::Get, "/echo", b"payload");
        let (ctx, _) = f.send(id, &frame);
        assert_eq!(f.response(ctx).await.text(), Some("GET /echo payload"));
    }

    #[tokio::test]
    async fn test_null_and_empty_buffers_are_bad_frames() {
        let f = fixture();
        let completion = f.engine.new_context();
        let cancellation = f.engine.new_context();
        unsafe {
            f.dispatcher
                .dispatch(0, std::ptr::null(), 4, completion.raw(), cancellation.raw());
        }
        let response = f.response(completion).await;
        assert_eq!(response.status(), 500);
        assert_eq!(response.text(), Some("bad request frame"));

        let (ctx, _) = f.send(0, &[]);
        assert_eq!(f.response(ctx).await.text(), Some("bad request frame"));
    }

    #[tokio::test]
    async fn test_malformed_frame_is_500() {
        let f = fixture();
        let (ctx, _) = f.send(0, &[0, 10, 0, 0, 0, b'/']);
        let response = f.response(ctx).await;
        assert_eq!(response.status(), 500);
        assert_eq!(response.text(), Some("cannot decode request"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_500() {
        let f = fixture();
        let (ctx, cctx) = f.send(7, &get("/"));
        let response = f.response(ctx).await;
        assert_eq!(response.status(), 500);
        assert_eq!(response.text(), Some("missing handler"));
        assert!(f.engine.events().contains(&Event::CancellationFreed(cctx)));
    }

    #[tokio::test]
    async fn test_http_error_keeps_status_and_body() {
        let f = fixture();
        let id = f.registry.register(
            Arc::new(|_req: Request| async { Err(HttpError::new(404, "not here").into()) }),
            vec![],
        );

        let (ctx, _) = f.send(id, &get("/"));
        let response = f.response(ctx).await;
        assert_eq!(response.status(), 404);
        assert_eq!(response.text(), Some("not here"));
    }

    #[tokio::test]
    async fn test_other_error_is_500_with_diagnostic() {
        let f = fixture();
        let id = f.registry.register(
            Arc::new(|_req: Request| async { Err(HandlerError::msg("database offline")) }),
            vec![],
        );

        let (ctx, _) = f.send(id, &get("/"));
        let response = f.response(ctx).await;
        assert_eq!(response.status(), 500);
        assert!(response.text().unwrap().contains("database offline"));
    }

    #[tokio::test]
    async fn test_panic_is_500() {
        let f = fixture();
        let id = f.registry.register(
            Arc::new(|_req: Request| async {
                if true {
                    panic!("handler blew up");
                }
                Ok(Response::ok("unreachable"))
            }),
            vec![],
        );

        let (ctx, _) = f.send(id, &get("/"));
        let response = f.response(ctx).await;
        assert_eq!(response.status(), 500);
        assert_eq!(
            response.text(),
            Some("Caught unhandled error: handler blew up")
        );
        assert_eq!(f.engine.completions(ctx), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_handler_releases_without_frame() {
        let f = fixture();
        let id = f.registry.register(
            Arc::new(|req: Request| async move {
                req.cancellation().throw_if_cancelled()?;
                Ok(Response::ok("ran"))
            }),
            vec![],
        );

        let completion = f.engine.new_context();
        let cancellation = f.engine.new_context();
        f.engine.cancel(cancellation);
        f.send_with(id, &get("/"), completion, cancellation);

        assert_eq!(
            f.engine.terminal(completion).await,
            Event::RequestFreed(completion)
        );
        assert_eq!(f.engine.completions(completion), 1);
    }

    #[test]
    fn test_cancelled_maps_to_499() {
        let (response, outcome) = settle(0, Ok(Err(Cancelled.into())));
        assert_eq!(response.status(), 499);
        assert!(response.body().is_empty());
        assert_eq!(outcome, DispatchOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_globals_run_before_route_middlewares() {
        let f = fixture();
        let order = Arc::new(Mutex::new(Vec::new()));

        let tag = |name: &'static str| -> kiri_middleware::BoxedMiddleware {
            let order = order.clone();
            Arc::new(FnMiddleware::new(name, move |req, next| {
                let order = order.clone();
                Box::pin(async move {
                    order.lock().push(name);
                    next.run(req).await
                })
            }))
        };

        f.registry.add_global(tag("global"));
        let id = f.registry.register(
            Arc::new(|_req: Request| async { Ok(Response::ok("ok")) }),
            vec![tag("route")],
        );

        let (ctx, _) = f.send(id, &get("/"));
        f.response(ctx).await;
        assert_eq!(*order.lock(), vec!["global", "route"]);
    }

    #[tokio::test]
    async fn test_contexts_released_exactly_once_under_load() {
        let f = fixture();
        let id = f.registry.register(
            Arc::new(|_req: Request| async {
                tokio::task::yield_now().await;
                Ok(Response::ok("ok"))
            }),
            vec![],
        );

        let sent: Vec<_> = (0..50).map(|_| f.send(id, &get("/"))).collect();
        for (ctx, cctx) in sent {
            f.response(ctx).await;
            assert_eq!(f.engine.completions(ctx), 1);
            for _ in 0..100 {
                if f.engine.events().contains(&Event::CancellationFreed(cctx)) {
                    break;
                }
                tokio::task::yield_now().await;
            }
            let freed = f
                .engine
                .events()
                .iter()
                .filter(|e| **e == Event::CancellationFreed(cctx))
                .count();
            assert_eq!(freed, 1);
        }
    }
}
