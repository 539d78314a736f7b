//! Test response wrapper.

use crate::error::TestError;
use bytes::Bytes;
use kiri_core::{Response, StatusCode};
use serde::de::DeserializeOwned;

/// What the peer observed for one dispatched request.
///
/// A request released without a frame (the cancellation path) reads as
/// status `499` with an empty body and [`was_sent`](Self::was_sent) false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResponse {
    status: StatusCode,
    body: Bytes,
    sent: bool,
}

impl TestResponse {
    /// Wraps a decoded response frame.
    pub fn sent(response: Response) -> Self {
        let (status, body) = response.into_parts();
        Self {
            status,
            body,
            sent: true,
        }
    }

    /// The context was released without a response frame.
    pub fn released() -> Self {
        Self {
            status: Response::CLIENT_CLOSED_REQUEST,
            body: Bytes::new(),
            sent: false,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns true if a response frame was transmitted.
    #[must_use]
    pub fn was_sent(&self) -> bool {
        self.sent
    }

    /// Returns true if the status is successful (2xx).
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true if the status is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("Invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Asserts that the status code equals `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {expected}, got {} (body: {:?})",
            self.status, self.body
        );
        self
    }

    /// Asserts that the body equals `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the body doesn't match.
    pub fn assert_text(&self, expected: &str) -> &Self {
        assert_eq!(
            self.body.as_ref(),
            expected.as_bytes(),
            "Expected body {expected:?}, got {:?}",
            self.body
        );
        self
    }
}
