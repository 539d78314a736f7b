//! Top-level configuration type.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, FrameSection, LogFormat, LoggingSection, RuntimeSection, ServerConfig};

/// Smallest frame that can carry a request (method plus two length fields).
const MIN_FRAME_LEN: usize = 9;

/// Complete Kiri application configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files or strings.
///
/// # Example
///
/// ```
/// use kiri_config::KiriConfig;
///
/// let config = KiriConfig::default();
/// assert_eq!(config.server.port, 8080);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct KiriConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Tokio runtime configuration.
    #[serde(default)]
    pub runtime: RuntimeSection,

    /// Frame codec limits.
    #[serde(default)]
    pub frame: FrameSection,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl KiriConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid_value(
                "server.port",
                "must be between 1 and 65535",
            ));
        }

        if self.runtime.worker_threads == Some(0) {
            return Err(ConfigError::invalid_value(
                "runtime.worker_threads",
                "must be at least 1",
            ));
        }

        if self.runtime.thread_name.is_empty() {
            return Err(ConfigError::invalid_value(
                "runtime.thread_name",
                "must not be empty",
            ));
        }

        if self.frame.max_frame_len < MIN_FRAME_LEN {
            return Err(ConfigError::invalid_value(
                "frame.max_frame_len",
                format!("must be at least {MIN_FRAME_LEN} bytes"),
            ));
        }

        if self.logging.enabled {
            kiri_telemetry::logging::create_env_filter(&self.logging.level)
                .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;
        }

        Ok(())
    }

    /// Development preset: pretty debug logs with source locations.
    ///
    /// ```
    /// use kiri_config::{KiriConfig, LogFormat};
    ///
    /// let config = KiriConfig::development();
    /// assert_eq!(config.logging.format, LogFormat::Pretty);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LoggingSection {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                include_location: true,
                thread_ids: true,
                ..LoggingSection::default()
            },
            ..Self::default()
        }
    }

    /// Production preset: JSON logs at info level.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(KiriConfig::default().validate().is_ok());
        assert!(KiriConfig::development().validate().is_ok());
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = KiriConfig::default();
        config.server.port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = KiriConfig::default();
        config.runtime.worker_threads = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tiny_frame_limit_rejected() {
        let mut config = KiriConfig::default();
        config.frame.max_frame_len = 4;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("frame.max_frame_len"));
    }

    #[test]
    fn test_bad_level_rejected_only_when_enabled() {
        let mut config = KiriConfig::default();
        config.logging.level = "kiri=verbose".to_string();
        assert!(config.validate().is_err());

        config.logging.enabled = false;
        assert!(config.validate().is_ok());
    }
}
