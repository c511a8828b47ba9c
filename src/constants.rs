// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Capture defaults
///
/// The capture resolution matches the localization model's input size so
/// no rescale happens between the camera and detection.
pub mod capture {
    /// Fixed capture width in pixels
    pub const WIDTH: u32 = 640;

    /// Fixed capture height in pixels
    pub const HEIGHT: u32 = 480;

    /// Rate at which frames are handed to the pipeline
    pub const TARGET_FPS: u32 = 15;

    /// Rate at which the synthetic sensor produces raw frames
    pub const SYNTHETIC_SENSOR_FPS: u32 = 30;

    /// Default synthetic fill color (RGB), a mid gray that gates as good lighting
    pub const SYNTHETIC_FILL_RGB: [u8; 3] = [128, 128, 128];

    /// Number of memory-mapped buffers requested from V4L2
    pub const V4L2_BUFFER_COUNT: u32 = 4;

    /// V4L2 pixel formats in order of preference
    pub const V4L2_PREFERRED_FOURCC: [&[u8; 4]; 3] = [b"NV12", b"YU12", b"YUYV"];
}

/// Detection cycle settings
pub mod detection {
    use super::Duration;

    /// Deadline for one localization call
    pub const DEADLINE: Duration = Duration::from_millis(500);

    /// Deadline for collaborator initialization
    pub const INIT_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Lighting gate settings
pub mod lighting {
    /// Mean luminance below this is too dark
    pub const TOO_DARK_THRESHOLD: f64 = 0.20;

    /// Mean luminance above this is too bright
    pub const TOO_BRIGHT_THRESHOLD: f64 = 0.85;

    /// Sample every Nth row and column of the central region
    pub const SAMPLE_STEP: u32 = 4;
}

/// Timing-related constants
pub mod timing {
    /// Log frame dispatch statistics every N accepted frames
    pub const FRAME_LOG_INTERVAL: u64 = 150;
}

/// Application information
pub mod app_info {
    /// Get the application version from Cargo.toml
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Directory name under the user config directory
    pub const CONFIG_DIR_NAME: &str = "resistor-scan";

    /// Config file name
    pub const CONFIG_FILE_NAME: &str = "config.json";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_interval_is_about_66ms() {
        let interval = Duration::from_secs(1) / capture::TARGET_FPS;
        assert_eq!(interval.as_millis(), 66);
    }

    #[test]
    fn test_lighting_thresholds_are_ordered() {
        assert!(lighting::TOO_DARK_THRESHOLD < lighting::TOO_BRIGHT_THRESHOLD);
        assert!(lighting::SAMPLE_STEP > 0);
    }
}
