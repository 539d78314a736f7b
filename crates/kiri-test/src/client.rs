//! Request harness for a running server on a [`MockEngine`].

use crate::engine::{ContextId, MockEngine, Terminal};
use crate::error::TestError;
use crate::response::TestResponse;
use bytes::Bytes;
use kiri_core::{FrameCodec, HttpMethod};
use kiri_ffi::RouteId;
use std::sync::Arc;
use std::time::Duration;

/// How long a request may take to reach its terminal action.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends requests through the dispatcher attached to a [`MockEngine`].
///
/// # Example
///
/// ```ignore
/// let engine = MockEngine::new();
/// let router = Arc::new(Router::new(engine.clone())?);
/// router.get("/hello", |_req| async { Ok(Response::ok("hi")) });
/// let server = Server::new(8080, router, Handle::current());
/// server.start()?;
///
/// let bridge = TestBridge::new(engine);
/// bridge.get("/hello").send().await?.assert_status(200).assert_text("hi");
/// ```
#[derive(Debug, Clone)]
pub struct TestBridge {
    engine: Arc<MockEngine>,
    codec: FrameCodec,
    timeout: Duration,
}

impl TestBridge {
    /// Creates a harness for `engine`.
    pub fn new(engine: Arc<MockEngine>) -> Self {
        Self {
            engine,
            codec: FrameCodec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets how long to wait for each terminal action.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Arc<MockEngine> {
        &self.engine
    }

    /// Creates a GET request builder.
    pub fn get(&self, path: impl Into<String>) -> TestRequest<'_> {
        self.request(HttpMethod::Get, path)
    }

    /// Creates a request builder for any method.
    pub fn request(&self, method: HttpMethod, path: impl Into<String>) -> TestRequest<'_> {
        TestRequest {
            bridge: self,
            method,
            path: path.into(),
            body: Bytes::new(),
            route_id: None,
            raw_frame: None,
            cancelled: false,
        }
    }

    /// Dispatches raw bytes to `route_id`, bypassing the encoder.
    pub fn send_raw(&self, route_id: RouteId, frame: &[u8]) -> Result<PendingRequest, TestError> {
        let (completion, cancellation) = self.engine.dispatch_frame(route_id, frame, false)?;
        Ok(self.pending(completion, cancellation))
    }

    fn pending(&self, completion: ContextId, cancellation: ContextId) -> PendingRequest {
        PendingRequest {
            engine: self.engine.clone(),
            codec: self.codec,
            timeout: self.timeout,
            completion,
            cancellation,
        }
    }
}

/// A request being built.
#[derive(Debug)]
pub struct TestRequest<'a> {
    bridge: &'a TestBridge,
    method: HttpMethod,
    path: String,
    body: Bytes,
    route_id: Option<RouteId>,
    raw_frame: Option<Vec<u8>>,
    cancelled: bool,
}

impl TestRequest<'_> {
    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the request body as JSON.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Result<Self, TestError> {
        self.body = Bytes::from(serde_json::to_vec(value)?);
        Ok(self)
    }

    /// Dispatches to `route_id` instead of resolving the path.
    #[must_use]
    pub fn route_id(mut self, route_id: RouteId) -> Self {
        self.route_id = Some(route_id);
        self
    }

    /// Sends these bytes instead of an encoded frame.
    #[must_use]
    pub fn raw_frame(mut self, frame: impl Into<Vec<u8>>) -> Self {
        self.raw_frame = Some(frame.into());
        self
    }

    /// Marks the request as abandoned by the peer before dispatch.
    #[must_use]
    pub fn cancelled(mut self) -> Self {
        self.cancelled = true;
        self
    }

    /// Hands the request to the dispatcher without waiting for it.
    pub fn dispatch(self) -> Result<PendingRequest, TestError> {
        let bridge = self.bridge;
        let route_id = match self.route_id {
            Some(id) => id,
            None => bridge
                .engine
                .resolve(self.method, &self.path)
                .ok_or_else(|| TestError::NoRoute {
                    method: self.method,
                    path: self.path.clone(),
                })?,
        };
        let frame = self.raw_frame.unwrap_or_else(|| {
            bridge
                .codec
                .encode_request(self.method, &self.path, &self.body)
        });

        let (completion, cancellation) =
            bridge
                .engine
                .dispatch_frame(route_id, &frame, self.cancelled)?;
        Ok(bridge.pending(completion, cancellation))
    }

    /// Dispatches the request and waits for the outcome.
    pub async fn send(self) -> Result<TestResponse, TestError> {
        self.dispatch()?.response().await
    }
}

/// A dispatched request whose terminal action may still be pending.
#[derive(Debug)]
pub struct PendingRequest {
    engine: Arc<MockEngine>,
    codec: FrameCodec,
    timeout: Duration,
    completion: ContextId,
    cancellation: ContextId,
}

impl PendingRequest {
    /// Flags the request as abandoned by the peer.
    pub fn cancel(&self) {
        self.engine.cancel(self.cancellation);
    }

    /// Returns the completion context.
    pub fn completion(&self) -> ContextId {
        self.completion
    }

    /// Returns the cancellation context.
    pub fn cancellation(&self) -> ContextId {
        self.cancellation
    }

    /// Waits for the terminal action and decodes it.
    pub async fn response(self) -> Result<TestResponse, TestError> {
        let terminal = tokio::time::timeout(self.timeout, self.engine.wait_terminal(self.completion))
            .await
            .map_err(|_| TestError::Timeout(self.timeout))?;

        match terminal {
            Terminal::Completed { frame, .. } => {
                Ok(TestResponse::sent(self.codec.decode_response(&frame)?))
            }
            Terminal::Released { .. } => Ok(TestResponse::released()),
        }
    }
}
