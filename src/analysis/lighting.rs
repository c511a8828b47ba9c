// SPDX-License-Identifier: GPL-3.0-only

//! Lighting-quality gate
//!
//! Samples the central 50% x 50% of a BGRA frame on a sparse grid and
//! classifies the mean perceived luminance. Bad input never fails: a frame
//! that yields no samples is [`LightingQuality::Unknown`].

use crate::backends::camera::types::NormalizedFrame;
use crate::config::LightingSettings;
use serde::Serialize;
use std::fmt;

/// Advisory lighting classification for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LightingQuality {
    Good,
    TooDark,
    TooBright,
    /// No usable samples (empty or too-small frame)
    #[default]
    Unknown,
}

impl LightingQuality {
    /// Short guidance text for the user
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::Good => "Lighting is good",
            Self::TooDark => "Too dark, add more light",
            Self::TooBright => "Too bright, reduce glare",
            Self::Unknown => "Lighting unknown",
        }
    }
}

impl fmt::Display for LightingQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Good => "good",
            Self::TooDark => "too_dark",
            Self::TooBright => "too_bright",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct LightingAnalyzer {
    too_dark: f64,
    too_bright: f64,
    step: usize,
}

impl Default for LightingAnalyzer {
    fn default() -> Self {
        Self::new(&LightingSettings::default())
    }
}

impl LightingAnalyzer {
    pub fn new(settings: &LightingSettings) -> Self {
        Self {
            too_dark: settings.too_dark,
            too_bright: settings.too_bright,
            step: settings.sample_step.max(1) as usize,
        }
    }

    pub fn analyze_frame(&self, frame: &NormalizedFrame) -> LightingQuality {
        self.analyze(&frame.data, frame.width, frame.height)
    }

    /// Classify a BGRA buffer
    pub fn analyze(&self, data: &[u8], width: u32, height: u32) -> LightingQuality {
        match self.mean_luminance(data, width, height) {
            None => LightingQuality::Unknown,
            Some(mean) if mean < self.too_dark => LightingQuality::TooDark,
            Some(mean) if mean > self.too_bright => LightingQuality::TooBright,
            Some(_) => LightingQuality::Good,
        }
    }

    /// Mean luminance in [0, 1] over the sampled central region
    ///
    /// Samples whose bytes lie past the end of `data` are skipped; `None`
    /// when nothing was sampled.
    pub fn mean_luminance(&self, data: &[u8], width: u32, height: u32) -> Option<f64> {
        let (w, h) = (width as usize, height as usize);
        let (x0, x1) = (w / 4, w * 3 / 4);
        let (y0, y1) = (h / 4, h * 3 / 4);

        let mut total = 0.0;
        let mut samples = 0u32;
        for y in (y0..y1).step_by(self.step) {
            for x in (x0..x1).step_by(self.step) {
                let idx = (y * w + x) * NormalizedFrame::BYTES_PER_PIXEL;
                let Some(px) = data.get(idx..idx + 3) else {
                    continue;
                };
                let (b, g, r) = (px[0] as f64, px[1] as f64, px[2] as f64);
                total += (0.299 * r + 0.587 * g + 0.114 * b) / 255.0;
                samples += 1;
            }
        }

        (samples > 0).then(|| total / samples as f64)
    }
}
