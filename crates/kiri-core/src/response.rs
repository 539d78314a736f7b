//! Handler responses.

use bytes::Bytes;

/// Numeric HTTP status as carried on the wire (any `u16`).
pub type StatusCode = u16;

/// A response produced by a handler or synthesized by dispatch.
///
/// Responses are plain values: a status and a body. They are consumed
/// exactly once, when dispatch encodes them into a response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    body: Bytes,
}

impl Response {
    /// `200 OK`.
    pub const OK: StatusCode = 200;
    /// Non-standard `499 Client Closed Request`, used for cancelled requests.
    pub const CLIENT_CLOSED_REQUEST: StatusCode = 499;
    /// `500 Internal Server Error`.
    pub const INTERNAL_SERVER_ERROR: StatusCode = 500;

    /// Creates a response with the given status and body.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a response with the given status and an empty body.
    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, Bytes::new())
    }

    /// `200` with a UTF-8 text body.
    pub fn ok(text: impl Into<String>) -> Self {
        Self::new(Self::OK, text.into())
    }

    /// `500` with a UTF-8 text body.
    pub fn internal_server_error(text: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_SERVER_ERROR, text.into())
    }

    /// `499` with an empty body.
    #[must_use]
    pub fn client_closed_request() -> Self {
        Self::empty(Self::CLIENT_CLOSED_REQUEST)
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

    /// Returns the body as UTF-8 text, if it is valid UTF-8.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Replaces the status, keeping the body.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Splits the response into status and body.
    #[must_use]
    pub fn into_parts(self) -> (StatusCode, Bytes) {
        (self.status, self.body)
    }
}
