// SPDX-License-Identifier: GPL-3.0-only

//! Scanner configuration
//!
//! Stored as JSON. Every field has a default, so a partial file (or no
//! file at all) yields a usable configuration.

use crate::backends::camera::{CameraBackendType, Framerate};
use crate::constants::{app_info, capture, detection, lighting};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Capture settings shared by every backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Resolution width
    pub width: u32,
    /// Resolution height
    pub height: u32,
    /// Rate at which frames are handed to the pipeline
    pub target_fps: u32,
    /// Rate at which the synthetic sensor produces frames
    pub sensor_fps: u32,
    /// Solid RGB color emitted by the synthetic sensor
    pub synthetic_fill: [u8; 3],
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: capture::WIDTH,
            height: capture::HEIGHT,
            target_fps: capture::TARGET_FPS,
            sensor_fps: capture::SYNTHETIC_SENSOR_FPS,
            synthetic_fill: capture::SYNTHETIC_FILL_RGB,
        }
    }
}

impl CaptureSettings {
    pub fn target_rate(&self) -> Framerate {
        Framerate::from_int(self.target_fps)
    }

    pub fn sensor_rate(&self) -> Framerate {
        Framerate::from_int(self.sensor_fps)
    }
}

/// Detection cycle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Deadline for one localization call, in milliseconds
    pub deadline_ms: u64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            deadline_ms: detection::DEADLINE.as_millis() as u64,
        }
    }
}

impl DetectionSettings {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Lighting gate settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingSettings {
    /// Mean luminance below this is too dark
    pub too_dark: f64,
    /// Mean luminance above this is too bright
    pub too_bright: f64,
    /// Sample every Nth row and column
    pub sample_step: u32,
}

impl Default for LightingSettings {
    fn default() -> Self {
        Self {
            too_dark: lighting::TOO_DARK_THRESHOLD,
            too_bright: lighting::TOO_BRIGHT_THRESHOLD,
            sample_step: lighting::SAMPLE_STEP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to use (Synthetic or V4L2)
    pub backend: CameraBackendType,
    /// Camera device path (first available device if unset)
    pub device_path: Option<String>,
    pub capture: CaptureSettings,
    pub detection: DetectionSettings,
    pub lighting: LightingSettings,
}

impl Config {
    /// Default config file location (`<config dir>/resistor-scan/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(app_info::CONFIG_DIR_NAME)
                .join(app_info::CONFIG_FILE_NAME)
        })
    }

    /// Load and validate a config file
    ///
    /// A missing file is not an error and yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                });
            }
        };

        let config: Config = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;

        info!(path = %path.display(), backend = %config.backend, "Loaded config");
        Ok(config)
    }

    /// Load from the default location, or defaults if there is none
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Write the config as pretty-printed JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |e: std::io::Error| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        if self.capture.width == 0 || self.capture.height == 0 {
            return invalid("capture", "resolution must be non-zero");
        }
        if self.capture.target_fps == 0 {
            return invalid("capture.target_fps", "must be non-zero");
        }
        if self.capture.sensor_fps == 0 {
            return invalid("capture.sensor_fps", "must be non-zero");
        }
        if self.detection.deadline_ms == 0 {
            return invalid("detection.deadline_ms", "must be non-zero");
        }
        if self.lighting.sample_step == 0 {
            return invalid("lighting.sample_step", "must be non-zero");
        }
        if !(0.0..=1.0).contains(&self.lighting.too_dark)
            || !(0.0..=1.0).contains(&self.lighting.too_bright)
            || self.lighting.too_dark >= self.lighting.too_bright
        {
            return invalid(
                "lighting",
                "thresholds must lie in [0, 1] with too_dark < too_bright",
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_capture_constants() {
        let config = Config::default();
        assert_eq!(config.backend, CameraBackendType::Synthetic);
        assert_eq!((config.capture.width, config.capture.height), (640, 480));
        assert_eq!(config.capture.target_fps, 15);
        assert_eq!(config.detection.deadline(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "backend": "v4l2", "capture": { "target_fps": 10 } }"#)
                .unwrap();
        assert_eq!(config.backend, CameraBackendType::V4l2);
        assert_eq!(config.capture.target_fps, 10);
        assert_eq!(config.capture.width, 640);
        assert_eq!(config.lighting.sample_step, 4);
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.lighting.too_dark = 0.9;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "lighting", .. })
        ));
    }
}
