//! Decoded requests and cooperative cancellation.

use crate::error::Cancelled;
use crate::frame::DecodedRequest;
use crate::method::HttpMethod;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Something that can answer "has the peer abandoned this request".
///
/// Dispatch backs this with the foreign cancellation context; tests and
/// tooling can use [`CancellationToken::never`] or their own source.
pub trait CancellationSource: Send + Sync + 'static {
    /// Returns true once the request should stop.
    fn is_cancelled(&self) -> bool;
}

/// Handler-visible cancellation token.
///
/// Cancellation is advisory: nothing preempts a running handler. Long
/// running handlers poll [`is_cancelled`](Self::is_cancelled) or call
/// [`throw_if_cancelled`](Self::throw_if_cancelled) at safe points.
#[derive(Clone)]
pub struct CancellationToken {
    source: Arc<dyn CancellationSource>,
}

impl CancellationToken {
    /// Creates a token backed by the given source.
    pub fn new(source: Arc<dyn CancellationSource>) -> Self {
        Self { source }
    }

    /// A token that never reports cancellation.
    #[must_use]
    pub fn never() -> Self {
        Self::new(Arc::new(Never))
    }

    /// Returns true if the peer abandoned the request.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }

    /// Returns [`Cancelled`] if the peer abandoned the request.
    ///
    /// The error converts into [`HandlerError`](crate::HandlerError) with `?`.
    pub fn throw_if_cancelled(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

struct Never;

impl CancellationSource for Never {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// An inbound request, valid for one dispatch.
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpMethod,
    path: String,
    body: Bytes,
    cancellation: CancellationToken,
}

impl Request {
    /// Creates a request.
    pub fn new(
        method: HttpMethod,
        path: impl Into<String>,
        body: impl Into<Bytes>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            body: body.into(),
            cancellation,
        }
    }

    /// Builds a request from a decoded frame.
    #[must_use]
    pub fn from_frame(frame: DecodedRequest, cancellation: CancellationToken) -> Self {
        Self {
            method: frame.method,
            path: frame.path,
            body: frame.body,
            cancellation,
        }
    }

    /// Returns the method.
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the cancellation token of this request.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns a copy of this request with a different path.
    ///
    /// Middlewares use this to rewrite the request before continuing.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Returns a copy of this request with a different body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}
