// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use resistor_scan::Config;
use resistor_scan::backends::camera::CameraBackendType;
use resistor_scan::errors::ConfigError;

#[test]
fn test_config_default() {
    let config = Config::default();

    // Check sensible defaults
    assert_eq!(config.backend, CameraBackendType::Synthetic);
    assert!(config.device_path.is_none());
    assert_eq!(config.capture.width, 640);
    assert_eq!(config.capture.height, 480);
    assert!(config.validate().is_ok(), "Defaults should validate");
}

#[test]
fn test_config_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.backend = CameraBackendType::V4l2;
    config.device_path = Some("/dev/video2".to_string());
    config.capture.target_fps = 10;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.backend, CameraBackendType::V4l2);
    assert_eq!(loaded.device_path.as_deref(), Some("/dev/video2"));
    assert_eq!(loaded.capture.target_fps, 10);
}

#[test]
fn test_partial_config_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "detection": { "deadline_ms": 250 } }"#).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.detection.deadline_ms, 250);
    assert_eq!(config.capture.width, 640);
    assert_eq!(config.backend, CameraBackendType::Synthetic);
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config.capture.target_fps, Config::default().capture.target_fps);
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        Config::load(&path),
        Err(ConfigError::Parse { .. })
    ));

    std::fs::write(&path, r#"{ "capture": { "target_fps": 0 } }"#).unwrap();
    assert!(matches!(
        Config::load(&path),
        Err(ConfigError::Invalid { .. })
    ));
}
