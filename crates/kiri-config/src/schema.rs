//! Configuration sections.

use kiri_core::FrameLimits;
use kiri_telemetry::LogConfig;
use serde::{Deserialize, Serialize};

/// Server section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Port handed to the native engine.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

/// Tokio runtime section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    /// Worker threads; `None` uses one per CPU core.
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Name given to worker threads.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Worker thread stack size in bytes; `None` keeps tokio's default.
    #[serde(default)]
    pub thread_stack_size: Option<usize>,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: default_thread_name(),
            thread_stack_size: None,
        }
    }
}

fn default_thread_name() -> String {
    "kiri-worker".to_string()
}

/// Frame codec section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FrameSection {
    /// Longest request frame accepted, in bytes.
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
}

impl Default for FrameSection {
    fn default() -> Self {
        Self {
            max_frame_len: default_max_frame_len(),
        }
    }
}

impl FrameSection {
    /// Converts the section into codec limits.
    #[must_use]
    pub fn limits(&self) -> FrameLimits {
        FrameLimits {
            max_frame_len: self.max_frame_len,
        }
    }
}

fn default_max_frame_len() -> usize {
    FrameLimits::DEFAULT_MAX_FRAME_LEN
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,

    /// Include thread IDs in logs.
    #[serde(default)]
    pub thread_ids: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
            thread_ids: false,
        }
    }
}

impl LoggingSection {
    /// Converts the section into a telemetry logging config.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            json_format: self.format == LogFormat::Json,
            file_line_info: self.include_location,
            thread_ids: self.thread_ids,
            ..LogConfig::default()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
