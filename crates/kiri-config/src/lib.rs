//! Typed configuration for Kiri applications.
//!
//! - TOML and JSON files or strings
//! - Strict parsing (unknown fields are errors)
//! - Validation on [`ConfigLoader::load`]
//!
//! The bridge itself never reads the environment; applications decide where
//! configuration comes from.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [runtime]
//! worker_threads = 4
//! thread_name = "kiri-worker"
//!
//! [frame]
//! max_frame_len = 16777216
//!
//! [logging]
//! enabled = true
//! level = "info"
//! format = "json"
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::KiriConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{FrameSection, LogFormat, LoggingSection, RuntimeSection, ServerConfig};
