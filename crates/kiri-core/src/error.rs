//! Error types raised inside a handler chain.
//!
//! Everything a handler or middleware can fail with is a [`HandlerError`].
//! Dispatch absorbs every variant at the boundary and turns it into exactly
//! one response:
//!
//! | Variant | Response |
//! |---|---|
//! | [`HandlerError::Http`] | the carried status and body |
//! | [`HandlerError::Cancelled`] | `499`, empty body |
//! | [`HandlerError::Other`] | `500` with a diagnostic body |

use crate::response::{Response, StatusCode};
use bytes::Bytes;
use thiserror::Error;

/// Result type returned by handlers, middlewares, and composed pipelines.
pub type HandlerResult = Result<Response, HandlerError>;

/// An intentional HTTP failure carrying the exact status and body to send.
///
/// # Example
///
/// ```
/// use kiri_core::{HandlerError, HttpError};
///
/// fn require_body(body: &[u8]) -> Result<(), HandlerError> {
///     if body.is_empty() {
///         return Err(HttpError::new(400, "empty body").into());
///     }
///     Ok(())
/// }
///
/// assert!(require_body(b"").is_err());
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("HTTP error {status}")]
pub struct HttpError {
    status: StatusCode,
    body: Bytes,
}

impl HttpError {
    /// Creates an HTTP error with the given status and body.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Converts the error into the response it stands for.
    #[must_use]
    pub fn into_response(self) -> Response {
        Response::new(self.status, self.body)
    }
}

/// Signal raised by [`CancellationToken::throw_if_cancelled`](crate::CancellationToken::throw_if_cancelled).
///
/// This is control flow rather than a failure: the peer has abandoned the
/// request and the chain should stop.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[error("request cancelled by peer")]
pub struct Cancelled;

/// Any failure raised by a handler or middleware.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Structured HTTP error with an explicit status and body.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The peer abandoned the request.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    /// Wraps an arbitrary error as [`HandlerError::Other`].
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(anyhow::Error::new(error))
    }

    /// Creates [`HandlerError::Other`] from a message.
    pub fn msg(message: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Other(anyhow::Error::msg(message))
    }

    /// Returns true for the cancellation signal.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Converts the error into the response dispatch sends for it.
    #[must_use]
    pub fn into_response(self) -> Response {
        match self {
            Self::Http(err) => err.into_response(),
            Self::Cancelled(_) => Response::client_closed_request(),
            Self::Other(err) => {
                Response::internal_server_error(format!("Caught unhandled error: {err:#}"))
            }
        }
    }
}
