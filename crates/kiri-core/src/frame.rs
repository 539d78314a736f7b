//! Binary frames exchanged with the native engine.
//!
//! All integers are little-endian.
//!
//! ```text
//! request:  u8 method | u32 path_len | path (UTF-8) | u32 body_len | body
//! response: u16 status | u32 body_len | body
//! ```
//!
//! Decoding never panics and never allocates for a length it has not
//! checked against the buffer first.

use crate::method::HttpMethod;
use crate::response::{Response, StatusCode};
use bytes::Bytes;
use thiserror::Error;

/// Largest body a frame can describe.
pub const MAX_BODY_LEN: usize = u32::MAX as usize;

/// Size of the fixed request header before the path.
const REQUEST_HEADER_LEN: usize = 1 + 4;

/// Size of the fixed response header.
const RESPONSE_HEADER_LEN: usize = 2 + 4;

/// Errors raised while decoding a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The buffer ends before a declared field.
    #[error("frame truncated reading {field}: need {needed} bytes, {available} available")]
    Truncated {
        /// Field being read.
        field: &'static str,
        /// Bytes the field requires.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// The request path is not valid UTF-8.
    #[error("request path is not valid UTF-8")]
    InvalidUtf8,

    /// The method code has no known mapping.
    #[error("unknown method code {0}")]
    UnknownMethod(u8),

    /// The frame exceeds the configured ceiling.
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    TooLarge {
        /// Frame length.
        len: usize,
        /// Configured ceiling.
        max: usize,
    },
}

/// Size limits applied while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Longest request frame accepted, in bytes.
    pub max_frame_len: usize,
}

impl FrameLimits {
    /// Default ceiling: 16 MiB.
    pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_frame_len: Self::DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// A request frame after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Request path.
    pub path: String,
    /// Request body.
    pub body: Bytes,
}

/// Encoder and decoder for the frame format.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec {
    limits: FrameLimits,
}

impl FrameCodec {
    /// Creates a codec with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a codec with the given limits.
    #[must_use]
    pub fn with_limits(limits: FrameLimits) -> Self {
        Self { limits }
    }

    /// Returns the limits of this codec.
    #[must_use]
    pub fn limits(&self) -> FrameLimits {
        self.limits
    }

    /// Decodes a request frame.
    ///
    /// Bytes after the declared body are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] if the frame is too large, truncated, carries
    /// an unknown method or a non UTF-8 path.
    pub fn decode_request(&self, buf: &[u8]) -> Result<DecodedRequest, FrameError> {
        if buf.len() > self.limits.max_frame_len {
            return Err(FrameError::TooLarge {
                len: buf.len(),
                max: self.limits.max_frame_len,
            });
        }

        let mut reader = Reader::new(buf);
        let code = reader.u8("method")?;
        let method = HttpMethod::from_code(code).ok_or(FrameError::UnknownMethod(code))?;

        let path_len = reader.u32("path length")? as usize;
        let path = reader.take("path", path_len)?;
        let path = std::str::from_utf8(path)
            .map_err(|_| FrameError::InvalidUtf8)?
            .to_owned();

        let body_len = reader.u32("body length")? as usize;
        let body = Bytes::copy_from_slice(reader.take("body", body_len)?);

        Ok(DecodedRequest { method, path, body })
    }

    /// Encodes a response frame.
    ///
    /// Bodies longer than [`MAX_BODY_LEN`] cannot be described; dispatch
    /// replaces them before they reach the codec.
    #[must_use]
    pub fn encode_response(&self, response: &Response) -> Vec<u8> {
        let body = response.body();
        let mut out = Vec::with_capacity(RESPONSE_HEADER_LEN + body.len());
        out.extend_from_slice(&response.status().to_le_bytes());
        out.extend_from_slice(&len_u32(body.len()).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    /// Encodes a request frame, as the native engine would.
    #[must_use]
    pub fn encode_request(&self, method: HttpMethod, path: &str, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(REQUEST_HEADER_LEN + path.len() + 4 + body.len());
        out.push(method.code());
        out.extend_from_slice(&len_u32(path.len()).to_le_bytes());
        out.extend_from_slice(path.as_bytes());
        out.extend_from_slice(&len_u32(body.len()).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    /// Decodes a response frame, as the native engine would.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Truncated`] if the buffer ends early.
    pub fn decode_response(&self, buf: &[u8]) -> Result<Response, FrameError> {
        let mut reader = Reader::new(buf);
        let status: StatusCode = reader.u16("status")?;
        let body_len = reader.u32("body length")? as usize;
        let body = Bytes::copy_from_slice(reader.take("body", body_len)?);
        Ok(Response::new(status, body))
    }
}

// Lengths above u32::MAX are clamped; callers check MAX_BODY_LEN first.
fn len_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, field: &'static str, needed: usize) -> Result<&'a [u8], FrameError> {
        let available = self.remaining();
        if needed > available {
            return Err(FrameError::Truncated {
                field,
                needed,
                available,
            });
        }
        let slice = &self.buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, FrameError> {
        Ok(self.take(field, 1)?[0])
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, FrameError> {
        let bytes = self.take(field, 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, FrameError> {
        let bytes = self.take(field, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
