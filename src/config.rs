//! Run configuration.
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or none at all) is a valid configuration. Command-line flags are
//! applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::traits::StreamMode;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device and stream settings.
    pub capture: CaptureConfig,
    /// Where and how snapshots are named.
    pub output: OutputConfig,
    /// Live preview settings.
    pub display: DisplayConfig,
    /// Log filter.
    pub logging: LoggingConfig,
}

/// Device and stream settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Devices to run, in order. `stub://name` selects a mock camera.
    pub devices: Vec<String>,
    /// Bounded wait for each frame, in milliseconds.
    pub timeout_ms: u64,
    /// Number of driver buffers for continuous acquisition.
    pub buffer_count: u32,
    /// Requested sensor width.
    pub width: u32,
    /// Requested sensor height.
    pub height: u32,
    /// Horizontal ROI offset.
    pub offset_x: u32,
    /// Vertical ROI offset.
    pub offset_y: u32,
    /// Transport stream mode.
    pub stream_mode: StreamMode,
}

/// Where and how snapshots are named.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Destination directory.
    pub directory: PathBuf,
    /// Group id of the first snapshot.
    pub group_id: u64,
}

/// Live preview settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Open a preview window (requires the `preview` feature).
    pub enabled: bool,
    /// Preview scale relative to the captured frame.
    pub scale: f32,
}

/// Log filter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            devices: vec![default_device()],
            timeout_ms: 50,
            buffer_count: 4,
            width: 2048,
            height: 2048,
            offset_x: 200,
            offset_y: 0,
            stream_mode: StreamMode::platform_default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("captures"),
            group_id: 1,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: 0.5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

fn default_device() -> String {
    if cfg!(feature = "v4l2") {
        "/dev/video0".into()
    } else {
        "stub://camera0".into()
    }
}

impl CaptureConfig {
    /// The per-frame wait as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.timeout_ms == 0 {
            return Err(ConfigError::Invalid("capture.timeout_ms must be positive".into()));
        }
        if self.capture.buffer_count == 0 {
            return Err(ConfigError::Invalid("capture.buffer_count must be positive".into()));
        }
        if !(self.display.scale > 0.0 && self.display.scale <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "display.scale must be in (0, 1], got {}",
                self.display.scale
            )));
        }
        if self.output.directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output.directory must not be empty".into()));
        }
        Ok(())
    }
}

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").expect("empty config should parse");
        assert_eq!(config.capture.timeout_ms, 50);
        assert_eq!(config.capture.buffer_count, 4);
        assert_eq!((config.capture.width, config.capture.height), (2048, 2048));
        assert_eq!((config.capture.offset_x, config.capture.offset_y), (200, 0));
        assert_eq!(config.output.group_id, 1);
        assert!((config.display.scale - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [capture]
            devices = ["stub://left", "stub://right"]
            stream_mode = "light_weight_filter"

            [output]
            directory = "/tmp/shots"
            group_id = 7
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.capture.devices, ["stub://left", "stub://right"]);
        assert_eq!(config.capture.stream_mode, StreamMode::LightWeightFilter);
        assert_eq!(config.capture.timeout(), Duration::from_millis(50));
        assert_eq!(config.output.directory, PathBuf::from("/tmp/shots"));
        assert_eq!(config.output.group_id, 7);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = Config::parse("[capture]\ntimeout_ms = 0\n").expect_err("should fail");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_scale() {
        assert!(Config::parse("[display]\nscale = 0.0\n").is_err());
        assert!(Config::parse("[display]\nscale = 2.0\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_stream_mode() {
        let err = Config::parse("[capture]\nstream_mode = \"usb\"\n").expect_err("should fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/tether.toml")).expect_err("should fail");
        assert!(matches!(err, ConfigError::ReadFile(..)));
    }
}
