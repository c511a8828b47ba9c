// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame analysis that runs before detection

pub mod lighting;

pub use lighting::{LightingAnalyzer, LightingQuality};
