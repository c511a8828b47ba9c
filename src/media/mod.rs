// SPDX-License-Identifier: GPL-3.0-only

//! Pixel-level media processing
//!
//! # Color Space Conversion
//!
//! Camera frames arrive in whatever layout the sensor produces (I420, NV12,
//! NV21, YUYV, or already-packed RGB). The [`yuv_converter`] module turns
//! all of them into the pipeline's canonical packed BGRA.
//!
//! # Modules
//!
//! - [`still`]: Image files as normalized frames
//! - [`yuv_converter`]: Native layouts to BGRA

pub mod still;
pub mod yuv_converter;

// Re-export commonly used items
pub use still::load_still_frame;
pub use yuv_converter::{ConvertError, convert_to_bgra};
