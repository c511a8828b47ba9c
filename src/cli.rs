// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Scanning a live feed
//! - Analyzing a still image or a typed band sequence

use resistor_scan::backends::camera::{
    CameraBackendType, CameraDevice, enumerate_cameras, get_backend_for_type,
    is_backend_available,
};
use resistor_scan::codec::{self, parse_band_list};
use resistor_scan::detection::{
    DetectionOrchestrator, FixedLocalizer, PendingModelLocalizer, ResistorLocalizer,
};
use resistor_scan::media::load_still_frame;
use resistor_scan::{Config, ScanSession};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Load the config from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    Ok(config)
}

/// `--bands` replaces the model with a localizer that always reports them
fn build_localizer(
    bands: Option<&str>,
) -> Result<Arc<dyn ResistorLocalizer>, Box<dyn std::error::Error>> {
    Ok(match bands {
        Some(list) => Arc::new(FixedLocalizer::centered(parse_band_list(list)?)),
        None => Arc::new(PendingModelLocalizer::new()),
    })
}

/// List all available cameras
pub fn list_cameras() -> CliResult {
    let mut found = false;

    for backend in CameraBackendType::ALL {
        if !is_backend_available(backend) {
            println!("{}: not built in", backend);
            continue;
        }

        let cameras = enumerate_cameras(backend);
        if cameras.is_empty() {
            println!("{}: no cameras found", backend);
            continue;
        }

        found = true;
        println!("{}:", backend);
        for (index, camera) in cameras.iter().enumerate() {
            println!("{}", camera_line(index, camera));
        }
    }

    if !found {
        println!("No cameras found.");
    }
    Ok(())
}

/// One `list` entry; the driver is shown only when the backend reports one
fn camera_line(index: usize, camera: &CameraDevice) -> String {
    match &camera.driver {
        Some(driver) => format!("  [{}] {} ({}, {})", index, camera.name, camera.path, driver),
        None => format!("  [{}] {} ({})", index, camera.name, camera.path),
    }
}

/// Scan a live feed until Ctrl+C or `seconds` elapse
///
/// Every published reading set goes to stdout as one JSON line. Lighting
/// guidance and the final stats go to stderr.
pub fn scan(
    mut config: Config,
    backend: Option<CameraBackendType>,
    device: Option<String>,
    seconds: Option<u64>,
    bands: Option<String>,
) -> CliResult {
    if let Some(backend) = backend {
        config.backend = backend;
    }
    if device.is_some() {
        config.device_path = device;
    }
    config.validate()?;

    let localizer = build_localizer(bands.as_deref())?;

    // Set up Ctrl+C handler
    let stop = Arc::new(Notify::new());
    let stop_clone = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        stop_clone.notify_one();
    })?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let source = get_backend_for_type(config.backend, &config)?;
        let orchestrator = Arc::new(DetectionOrchestrator::new(localizer, &config));
        let mut session = ScanSession::new(source, Arc::clone(&orchestrator));

        let mut readings = orchestrator.subscribe_readings();
        let mut lighting = orchestrator.subscribe_lighting();

        session.start().await?;
        match session.source().device() {
            Some(device) => eprintln!("Scanning with {} (Ctrl+C to stop)", device.name),
            None => eprintln!("Scanning (Ctrl+C to stop)"),
        }

        let timer = async {
            match seconds {
                Some(s) => tokio::time::sleep(Duration::from_secs(s)).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = stop.notified() => break,
                _ = &mut timer => break,
                changed = readings.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let set = readings.borrow_and_update().clone();
                    println!("{}", serde_json::to_string(&*set)?);
                }
                changed = lighting.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let quality = *lighting.borrow_and_update();
                    eprintln!("Lighting: {} - {}", quality, quality.guidance());
                }
            }
        }

        session.stop().await?;
        eprintln!(
            "Stopped. Capture: {}",
            serde_json::to_string(&session.source().stats())?
        );
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Run one detection cycle on a still image and print the reading set
pub fn analyze(config: Config, image: PathBuf, bands: Option<String>) -> CliResult {
    let localizer = build_localizer(bands.as_deref())?;
    let frame = load_still_frame(&image)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let orchestrator = DetectionOrchestrator::new(localizer, &config);
        orchestrator.initialize().await?;
        orchestrator.submit(frame).await;

        let set = orchestrator.latest_readings();
        println!("{}", serde_json::to_string_pretty(&*set)?);
        if set.readings.is_empty() {
            eprintln!("No resistors decoded. Lighting: {}", set.lighting.guidance());
        }

        orchestrator.shutdown();
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Decode a typed band list
pub fn decode(bands: &str) -> CliResult {
    let bands = parse_band_list(bands)?;
    let decoded = codec::decode(&bands)?;
    println!("{}", serde_json::to_string_pretty(&decoded)?);
    Ok(())
}

/// Print the effective configuration, optionally writing it back
pub fn show_config(config: &Config, path: Option<&Path>, write: bool) -> CliResult {
    println!("{}", serde_json::to_string_pretty(config)?);

    if write {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Config::default_path().ok_or("no config directory on this system")?,
        };
        config.save(&path)?;
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resistor_scan::backends::camera::synthetic::synthetic_device;

    #[test]
    fn test_camera_line_without_driver() {
        assert_eq!(
            camera_line(0, &synthetic_device()),
            "  [0] Synthetic camera (synthetic:0)"
        );
    }

    #[test]
    fn test_camera_line_with_driver() {
        let camera = CameraDevice {
            name: "USB Camera".to_string(),
            path: "/dev/video0".to_string(),
            driver: Some("uvcvideo".to_string()),
        };
        assert_eq!(
            camera_line(2, &camera),
            "  [2] USB Camera (/dev/video0, uvcvideo)"
        );
    }
}
