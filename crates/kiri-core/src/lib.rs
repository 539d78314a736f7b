//! # Kiri Core
//!
//! Core types shared by every layer of the Kiri bridge.
//!
//! - [`Request`] / [`Response`] - the values handlers consume and produce
//! - [`CancellationToken`] - cooperative, poll-based cancellation
//! - [`HttpError`] / [`HandlerError`] - the error taxonomy of a handler chain
//! - [`FrameCodec`] - the binary wire format exchanged with the native engine
//! - [`path::join`] - route pattern normalisation

#![doc(html_root_url = "https://docs.rs/kiri-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod frame;
mod method;
pub mod path;
mod request;
mod response;

pub use error::{Cancelled, HandlerError, HandlerResult, HttpError};
pub use frame::{DecodedRequest, FrameCodec, FrameError, FrameLimits};
pub use method::HttpMethod;
pub use request::{CancellationSource, CancellationToken, Request};
pub use response::{Response, StatusCode};
