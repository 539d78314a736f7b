//! # Kiri Test
//!
//! Drives the bridge without the native engine. [`MockEngine`] implements
//! [`Engine`](kiri_ffi::Engine) in memory: it records registered routes,
//! resolves paths the way the native matcher would, and captures every
//! terminal action. [`TestBridge`] encodes requests, calls the dispatcher
//! exactly like the engine does, and decodes what comes back.
//!
//! ```ignore
//! use kiri_test::{MockEngine, TestBridge};
//!
//! #[tokio::test]
//! async fn hello() {
//!     let engine = MockEngine::new();
//!     // build a Router and Server on `engine`, then start it
//!     let bridge = TestBridge::new(engine.clone());
//!     let response = bridge.get("/hello").send().await.unwrap();
//!     response.assert_status(200).assert_text("hi");
//!     assert!(engine.unterminated().is_empty());
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/kiri-test/0.1.0")]
#![warn(missing_docs)]

mod client;
mod engine;
mod error;
mod response;

pub use client::{PendingRequest, TestBridge, TestRequest, DEFAULT_TIMEOUT};
pub use engine::{ContextId, MockEngine, RegisteredRoute, Terminal};
pub use error::TestError;
pub use response::TestResponse;
