// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera backend
//!
//! A virtual sensor that emits solid-color YUV 4:2:0 frames at a fixed
//! sensor rate. It goes through the same throttle, conversion and mailbox
//! path as a hardware camera, so it is what headless runs and the test
//! suite use.

use super::dispatcher::{DispatchCounters, DispatchOutcome, DispatchStats, FrameDispatcher};
use super::frame_loop::{CaptureLoopController, LoopAction};
use super::mailbox::{FrameReceiver, FrameSender, frame_mailbox};
use super::types::{
    BackendError, BackendResult, CameraBackendType, CameraDevice, Framerate, PlaneLayout, RawFrame,
};
use super::FrameSource;
use crate::config::CaptureSettings;
use crate::media::yuv_converter::rgb_to_yuv;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Native layout produced by the synthetic sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyntheticLayout {
    /// Three planes, chroma at half resolution
    #[default]
    I420,
    /// Luma plane plus one interleaved UV plane
    Nv12,
}

/// Device identity reported by the synthetic backend
pub fn synthetic_device() -> CameraDevice {
    CameraDevice {
        name: "Synthetic camera".to_string(),
        path: "synthetic:0".to_string(),
        driver: None,
    }
}

pub struct SyntheticCamera {
    width: u32,
    height: u32,
    sensor_rate: Framerate,
    target_rate: Framerate,
    fill_rgb: [u8; 3],
    layout: SyntheticLayout,
    device: CameraDevice,
    sender: FrameSender,
    receiver: FrameReceiver,
    controller: Option<CaptureLoopController>,
    counters: Option<Arc<DispatchCounters>>,
}

impl SyntheticCamera {
    pub fn new(settings: &CaptureSettings) -> Self {
        let (sender, receiver) = frame_mailbox();
        Self {
            width: settings.width,
            height: settings.height,
            sensor_rate: settings.sensor_rate(),
            target_rate: settings.target_rate(),
            fill_rgb: settings.synthetic_fill,
            layout: SyntheticLayout::default(),
            device: synthetic_device(),
            sender,
            receiver,
            controller: None,
            counters: None,
        }
    }

    /// Select the native layout (takes effect on the next `start()`)
    pub fn with_layout(mut self, layout: SyntheticLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Select the fill color (takes effect on the next `start()`)
    pub fn with_fill(mut self, rgb: [u8; 3]) -> Self {
        self.fill_rgb = rgb;
        self
    }
}

impl FrameSource for SyntheticCamera {
    fn start(&mut self) -> BackendResult<()> {
        if self.is_running() {
            debug!("Synthetic camera already running");
            return Ok(());
        }
        // Reap a loop that ended on its own
        if let Some(mut controller) = self.controller.take() {
            controller.join();
        }

        self.sender.reopen();
        let dispatcher = FrameDispatcher::new(self.target_rate, self.sender.clone());
        let counters = dispatcher.counters();

        let (width, height, rate, rgb, layout) = (
            self.width,
            self.height,
            self.sensor_rate,
            self.fill_rgb,
            self.layout,
        );
        let controller = CaptureLoopController::start_with_init(
            "synthetic-capture",
            move || SyntheticSensor::open(width, height, rate, rgb, layout, dispatcher),
            |sensor: &mut SyntheticSensor| sensor.tick(),
        )?;

        info!(
            width,
            height,
            sensor_fps = %self.sensor_rate,
            target_fps = %self.target_rate,
            layout = ?self.layout,
            "Synthetic camera started"
        );
        self.controller = Some(controller);
        self.counters = Some(counters);
        Ok(())
    }

    fn stop(&mut self) -> BackendResult<()> {
        if let Some(mut controller) = self.controller.take() {
            controller.stop();
            info!("Synthetic camera stopped");
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
        CameraBackendType::Synthetic
    }

    fn device(&self) -> Option<&CameraDevice> {
        Some(&self.device)
    }

    fn stats(&self) -> DispatchStats {
        self.counters
            .as_ref()
            .map(|c| c.snapshot())
            .unwrap_or_default()
    }
}

/// Capture-thread state: the pre-filled native buffer and the pacing clock
struct SyntheticSensor {
    buffer: Vec<u8>,
    width: u32,
    height: u32,
    layout: PlaneLayout,
    period: Duration,
    next_tick: Instant,
    dispatcher: FrameDispatcher,
}

impl SyntheticSensor {
    fn open(
        width: u32,
        height: u32,
        rate: Framerate,
        rgb: [u8; 3],
        layout: SyntheticLayout,
        dispatcher: FrameDispatcher,
    ) -> BackendResult<Self> {
        if width == 0 || height == 0 {
            return Err(BackendError::InitializationFailed(format!(
                "invalid capture resolution {}x{}",
                width, height
            )));
        }
        let period = rate.frame_interval();
        if period.is_zero() {
            return Err(BackendError::InitializationFailed(format!(
                "invalid sensor rate {}",
                rate
            )));
        }

        let (y, u, v) = rgb_to_yuv(rgb[0], rgb[1], rgb[2]);
        let (w, h) = (width as usize, height as usize);
        let chroma_rows = h.div_ceil(2);
        let chroma_cols = w.div_ceil(2);

        let (buffer, plane_layout) = match layout {
            SyntheticLayout::I420 => {
                let mut buffer = vec![y; w * h];
                buffer.extend(std::iter::repeat_n(u, chroma_cols * chroma_rows));
                buffer.extend(std::iter::repeat_n(v, chroma_cols * chroma_rows));
                (buffer, PlaneLayout::i420(width, height))
            }
            SyntheticLayout::Nv12 => {
                // Interleaved UV rows need an even stride
                let stride = chroma_cols * 2;
                let mut buffer = vec![y; stride * h];
                for _ in 0..chroma_rows * chroma_cols {
                    buffer.push(u);
                    buffer.push(v);
                }
                (buffer, PlaneLayout::nv12(height, stride))
            }
        };

        debug!(bytes = buffer.len(), ?plane_layout, "Synthetic sensor ready");
        Ok(Self {
            buffer,
            width,
            height,
            layout: plane_layout,
            period,
            next_tick: Instant::now(),
            dispatcher,
        })
    }

    fn tick(&mut self) -> LoopAction {
        let now = Instant::now();
        if self.next_tick > now {
            std::thread::sleep(self.next_tick - now);
        }
        self.next_tick += self.period;
        let now = Instant::now();
        if self.next_tick < now {
            // Fell behind; resync instead of bursting
            self.next_tick = now + self.period;
        }

        let raw = RawFrame {
            data: &self.buffer,
            width: self.width,
            height: self.height,
            layout: self.layout,
        };
        match self.dispatcher.on_raw_frame(&raw, now) {
            DispatchOutcome::Closed => {
                debug!("Frame mailbox closed, ending synthetic capture");
                LoopAction::Stop
            }
            _ => LoopAction::Continue,
        }
    }
}
