// SPDX-License-Identifier: GPL-3.0-only

//! Seam to the resistor localization model
//!
//! Finding resistors in a frame and classifying their bands is the job of
//! an external model. The pipeline only needs it as an async capability:
//! initialize once, then "given pixels, return boxes with optional bands".

use crate::codec::ColorBand;
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

/// Normalized box in frame coordinates
///
/// All fields are expected in [0, 1]; see [`BoundingBox::clamped`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
        }
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    /// Force every field into [0, 1] and the box inside the frame
    ///
    /// NaN becomes 0. Returns the clamped box and whether anything changed.
    pub fn clamped(self) -> (Self, bool) {
        fn unit(v: f32) -> f32 {
            if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
        }

        let x = unit(self.x);
        let y = unit(self.y);
        let clamped = Self {
            x,
            y,
            width: unit(self.width).min(1.0 - x),
            height: unit(self.height).min(1.0 - y),
            confidence: unit(self.confidence),
        };
        let changed = clamped != self;
        (clamped, changed)
    }
}

/// One call into the localizer
#[derive(Debug, Clone, Copy)]
pub struct DetectionRequest<'a> {
    /// BGRA pixels, `width * height * 4` bytes
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// The caller stops waiting at this instant
    pub deadline: Instant,
}

/// A localized resistor, with its bands when the model could read them
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub bands: Option<Vec<ColorBand>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectionError {
    /// `detect` called before `initialize` completed
    #[error("localizer is not initialized")]
    NotReady,
    /// The model is not available in this build
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// The call exceeded its deadline
    #[error("detection exceeded its deadline")]
    Timeout,
    #[error("{0}")]
    Failed(String),
}

/// Async localization capability
pub trait ResistorLocalizer: Send + Sync {
    /// Prepare the model; must succeed before `detect`
    fn initialize(&self) -> BoxFuture<'_, Result<(), DetectionError>>;

    fn is_initialized(&self) -> bool;

    /// Locate resistors in one frame
    fn detect<'a>(
        &'a self,
        request: DetectionRequest<'a>,
    ) -> BoxFuture<'a, Result<Vec<Detection>, DetectionError>>;
}

/// Localizer for builds that ship without a model
///
/// Initializes successfully and never finds anything.
#[derive(Debug, Default)]
pub struct PendingModelLocalizer {
    initialized: AtomicBool,
}

impl PendingModelLocalizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResistorLocalizer for PendingModelLocalizer {
    fn initialize(&self) -> BoxFuture<'_, Result<(), DetectionError>> {
        Box::pin(async move {
            self.initialized.store(true, Ordering::SeqCst);
            debug!("Localization model not bundled, detections will be empty");
            Ok(())
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn detect<'a>(
        &'a self,
        _request: DetectionRequest<'a>,
    ) -> BoxFuture<'a, Result<Vec<Detection>, DetectionError>> {
        Box::pin(async move {
            if !self.is_initialized() {
                return Err(DetectionError::NotReady);
            }
            Ok(Vec::new())
        })
    }
}

/// Localizer that reports the same detections for every frame
///
/// Drives the demo binary and tests: pair it with a known band sequence
/// to exercise decoding and publishing end to end.
#[derive(Debug)]
pub struct FixedLocalizer {
    detections: Vec<Detection>,
    latency: Duration,
    initialized: AtomicBool,
    calls: AtomicU64,
}

impl FixedLocalizer {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            latency: Duration::ZERO,
            initialized: AtomicBool::new(false),
            calls: AtomicU64::new(0),
        }
    }

    /// A single centered resistor with the given bands
    pub fn centered(bands: Vec<ColorBand>) -> Self {
        Self::new(vec![Detection {
            bounding_box: BoundingBox::new(0.35, 0.4, 0.3, 0.2, 0.9),
            bands: Some(bands),
        }])
    }

    /// Simulated inference time per call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of `detect` calls so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ResistorLocalizer for FixedLocalizer {
    fn initialize(&self) -> BoxFuture<'_, Result<(), DetectionError>> {
        Box::pin(async move {
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn detect<'a>(
        &'a self,
        _request: DetectionRequest<'a>,
    ) -> BoxFuture<'a, Result<Vec<Detection>, DetectionError>> {
        Box::pin(async move {
            if !self.is_initialized() {
                return Err(DetectionError::NotReady);
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            Ok(self.detections.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(pixels: &[u8]) -> DetectionRequest<'_> {
        DetectionRequest {
            pixels,
            width: 1,
            height: 1,
            deadline: Instant::now() + Duration::from_millis(500),
        }
    }

    #[test]
    fn test_center_is_derived() {
        let bbox = BoundingBox::new(0.2, 0.4, 0.4, 0.2, 1.0);
        assert!((bbox.center_x() - 0.4).abs() < 1e-6);
        assert!((bbox.center_y() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_clamp_keeps_box_inside_frame() {
        let (bbox, changed) = BoundingBox::new(-0.1, 0.8, 0.5, 0.5, 1.3).clamped();
        assert!(changed);
        assert_eq!(bbox.x, 0.0);
        assert_eq!(bbox.y, 0.8);
        assert!((bbox.height - 0.2).abs() < 1e-6);
        assert_eq!(bbox.confidence, 1.0);

        let valid = BoundingBox::new(0.1, 0.1, 0.2, 0.2, 0.5);
        assert_eq!(valid.clamped(), (valid, false));
    }

    #[test]
    fn test_nan_clamps_to_zero() {
        let (bbox, changed) = BoundingBox::new(f32::NAN, 0.1, 0.1, 0.1, 0.5).clamped();
        assert!(changed);
        assert_eq!(bbox.x, 0.0);
    }

    #[tokio::test]
    async fn test_pending_model_requires_initialize() {
        let localizer = PendingModelLocalizer::new();
        let pixels = [0u8; 4];
        assert_eq!(
            localizer.detect(request(&pixels)).await,
            Err(DetectionError::NotReady)
        );

        localizer.initialize().await.unwrap();
        assert!(localizer.is_initialized());
        assert_eq!(localizer.detect(request(&pixels)).await, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_fixed_localizer_repeats_detections() {
        let localizer = FixedLocalizer::centered(vec![
            ColorBand::Yellow,
            ColorBand::Violet,
            ColorBand::Brown,
            ColorBand::Gold,
        ]);
        localizer.initialize().await.unwrap();
        let pixels = [0u8; 4];

        for _ in 0..2 {
            let detections = localizer.detect(request(&pixels)).await.unwrap();
            assert_eq!(detections.len(), 1);
            assert_eq!(detections[0].bands.as_ref().map(Vec::len), Some(4));
        }
        assert_eq!(localizer.calls(), 2);
    }
}
