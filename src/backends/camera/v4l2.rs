// SPDX-License-Identifier: GPL-3.0-only

//! Video4Linux2 camera backend
//!
//! Opens a `/dev/video*` capture node, negotiates the fixed capture
//! resolution in a YUV format the converter understands, and streams
//! through memory-mapped buffers on the capture thread. The device and
//! its stream live entirely on that thread and are dropped when it exits.

use super::dispatcher::{DispatchCounters, DispatchOutcome, DispatchStats, FrameDispatcher};
use super::frame_loop::{CaptureLoopController, LoopAction};
use super::mailbox::{FrameReceiver, FrameSender, frame_mailbox};
use super::types::{
    BackendError, BackendResult, CameraBackendType, CameraDevice, CameraFormat, Framerate,
    PixelFormat, PlaneLayout, RawFrame,
};
use super::FrameSource;
use crate::config::Config;
use crate::constants::capture::{V4L2_BUFFER_COUNT, V4L2_PREFERRED_FOURCC};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Consecutive dequeue failures after which the capture loop gives up
const MAX_CONSECUTIVE_ERRORS: u32 = 30;

/// Enumerate V4L2 video capture nodes
pub fn enumerate_devices() -> Vec<CameraDevice> {
    let mut paths: Vec<_> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("video"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    paths
        .iter()
        .filter_map(|path| probe_device(path))
        .collect()
}

fn probe_device(path: &Path) -> Option<CameraDevice> {
    let dev = Device::with_path(path).ok()?;
    let caps = dev.query_caps().ok()?;
    if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
        debug!(path = %path.display(), "Skipping non-capture node");
        return None;
    }
    Some(CameraDevice {
        name: caps.card,
        path: path.to_string_lossy().to_string(),
        driver: Some(caps.driver),
    })
}

pub struct V4l2Camera {
    device_path: Option<String>,
    width: u32,
    height: u32,
    target_rate: Framerate,
    device: Option<CameraDevice>,
    sender: FrameSender,
    receiver: FrameReceiver,
    controller: Option<CaptureLoopController>,
    counters: Option<Arc<DispatchCounters>>,
}

impl V4l2Camera {
    pub fn new(config: &Config) -> Self {
        let (sender, receiver) = frame_mailbox();
        Self {
            device_path: config.device_path.clone(),
            width: config.capture.width,
            height: config.capture.height,
            target_rate: config.capture.target_rate(),
            device: None,
            sender,
            receiver,
            controller: None,
            counters: None,
        }
    }
}

impl FrameSource for V4l2Camera {
    fn start(&mut self) -> BackendResult<()> {
        if self.is_running() {
            debug!("V4L2 camera already running");
            return Ok(());
        }
        if let Some(mut controller) = self.controller.take() {
            controller.join();
        }

        let device = match &self.device_path {
            Some(path) => probe_device(Path::new(path))
                .ok_or_else(|| BackendError::DeviceNotFound(path.clone()))?,
            None => enumerate_devices().into_iter().next().ok_or_else(|| {
                BackendError::DeviceNotFound("no V4L2 capture devices".to_string())
            })?,
        };

        self.sender.reopen();
        let dispatcher = FrameDispatcher::new(self.target_rate, self.sender.clone());
        let counters = dispatcher.counters();
        let (width, height) = (self.width, self.height);
        let path = device.path.clone();

        // The negotiated format is only known on the capture thread
        let (format_tx, format_rx) = mpsc::channel();
        let controller = CaptureLoopController::start_with_init(
            "v4l2-capture",
            move || {
                let capture = V4l2Capture::open(&path, width, height, dispatcher)?;
                let _ = format_tx.send((capture.pixel_format, capture.row_stride));
                Ok::<_, BackendError>(capture)
            },
            |capture: &mut V4l2Capture| capture.tick(),
        )?;

        if let Ok((pixel_format, row_stride)) = format_rx.recv_timeout(Duration::from_secs(1)) {
            let format = CameraFormat {
                width,
                height,
                framerate: self.target_rate,
                pixel_format,
            };
            info!(
                device = %device.path,
                name = %device.name,
                %format,
                row_stride,
                "V4L2 camera started"
            );
        }
        self.device = Some(device);
        self.controller = Some(controller);
        self.counters = Some(counters);
        Ok(())
    }

    fn stop(&mut self) -> BackendResult<()> {
        if let Some(mut controller) = self.controller.take() {
            controller.stop();
            info!("V4L2 camera stopped");
        }
        self.sender.close();
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.controller
            .as_ref()
            .map(CaptureLoopController::is_running)
            .unwrap_or(false)
    }

    fn subscribe(&self) -> FrameReceiver {
        self.receiver.clone()
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn device(&self) -> Option<&CameraDevice> {
        self.device.as_ref()
    }

    fn stats(&self) -> DispatchStats {
        self.counters
            .as_ref()
            .map(|c| c.snapshot())
            .unwrap_or_default()
    }
}

/// Capture-thread state
///
/// Field order matters: the stream unmaps its buffers before the device
/// handle closes.
struct V4l2Capture {
    stream: MmapStream<'static>,
    _device: Device,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    row_stride: usize,
    layout: PlaneLayout,
    dispatcher: FrameDispatcher,
    consecutive_errors: u32,
}

impl V4l2Capture {
    fn open(
        path: &str,
        width: u32,
        height: u32,
        dispatcher: FrameDispatcher,
    ) -> BackendResult<Self> {
        let dev = Device::with_path(path).map_err(|e| {
            BackendError::InitializationFailed(format!("failed to open {}: {}", path, e))
        })?;

        let (format, pixel_format) = negotiate_format(&dev, width, height)?;
        if format.width != width || format.height != height {
            return Err(BackendError::FormatNotSupported(format!(
                "{} offers {}x{}, need {}x{}",
                path, format.width, format.height, width, height
            )));
        }

        let row_stride = if format.stride == 0 {
            pixel_format.min_row_bytes(width)
        } else {
            format.stride as usize
        };
        let layout = PlaneLayout::for_format(pixel_format, height, row_stride);

        let stream = MmapStream::with_buffers(&dev, Type::VideoCapture, V4L2_BUFFER_COUNT)
            .map_err(|e| {
                BackendError::InitializationFailed(format!(
                    "failed to create buffer stream on {}: {}",
                    path, e
                ))
            })?;

        Ok(Self {
            stream,
            _device: dev,
            width,
            height,
            pixel_format,
            row_stride,
            layout,
            dispatcher,
            consecutive_errors: 0,
        })
    }

    fn tick(&mut self) -> LoopAction {
        let (buf, meta) = match self.stream.next() {
            Ok(frame) => frame,
            Err(e) => {
                self.consecutive_errors += 1;
                warn!(error = %e, attempts = self.consecutive_errors, "Failed to dequeue V4L2 buffer");
                if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    warn!("Too many capture errors, ending V4L2 capture");
                    return LoopAction::Stop;
                }
                std::thread::sleep(Duration::from_millis(10));
                return LoopAction::Continue;
            }
        };
        self.consecutive_errors = 0;

        let used = meta.bytesused as usize;
        let data = if used > 0 && used <= buf.len() {
            &buf[..used]
        } else {
            buf
        };
        let raw = RawFrame {
            data,
            width: self.width,
            height: self.height,
            layout: self.layout,
        };
        match self.dispatcher.on_raw_frame(&raw, Instant::now()) {
            DispatchOutcome::Closed => {
                debug!("Frame mailbox closed, ending V4L2 capture");
                LoopAction::Stop
            }
            _ => LoopAction::Continue,
        }
    }
}

/// Try the preferred fourccs in order; keep the first the driver accepts
fn negotiate_format(dev: &Device, width: u32, height: u32) -> BackendResult<(v4l::Format, PixelFormat)> {
    for code in V4L2_PREFERRED_FOURCC {
        let requested = v4l::Format::new(width, height, FourCC::new(code));
        let applied = match dev.set_format(&requested) {
            Ok(f) => f,
            Err(e) => {
                debug!(fourcc = ?requested.fourcc, error = %e, "Format rejected");
                continue;
            }
        };
        // Drivers may silently substitute another fourcc
        if applied.fourcc != requested.fourcc {
            debug!(requested = ?requested.fourcc, got = ?applied.fourcc, "Driver substituted format");
            continue;
        }
        if let Some(pixel_format) = PixelFormat::from_fourcc(&applied.fourcc.repr) {
            return Ok((applied, pixel_format));
        }
    }
    Err(BackendError::FormatNotSupported(
        "device offers none of NV12, YU12, YUYV".to_string(),
    ))
}
