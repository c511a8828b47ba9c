// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use resistor_scan::constants::{capture, detection, lighting};

#[test]
fn test_lighting_thresholds_are_ordered() {
    assert!(lighting::TOO_DARK_THRESHOLD > 0.0);
    assert!(lighting::TOO_DARK_THRESHOLD < lighting::TOO_BRIGHT_THRESHOLD);
    assert!(lighting::TOO_BRIGHT_THRESHOLD < 1.0);
}

#[test]
fn test_sensor_outpaces_target_rate() {
    // The synthetic sensor must run faster than the throttle or nothing is dropped
    assert!(capture::SYNTHETIC_SENSOR_FPS > capture::TARGET_FPS);
}

#[test]
fn test_detection_deadline_fits_in_init_timeout() {
    assert!(detection::DEADLINE < detection::INIT_TIMEOUT);
    assert_eq!(detection::DEADLINE.as_millis(), 500);
}
