// SPDX-License-Identifier: GPL-3.0-only

//! Still images as pipeline frames
//!
//! Decodes a PNG/JPEG (anything the `image` crate reads) and normalizes it
//! through the converter's packed RGBA path, so a file can be run through
//! one detection cycle exactly like a camera frame.

use super::yuv_converter::{ConvertError, convert_to_bgra};
use crate::backends::camera::types::{NormalizedFrame, PackedOrder, PlaneLayout, RawFrame};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StillImageError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to normalize image: {0}")]
    Convert(#[from] ConvertError),
}

/// Load an image file as a normalized BGRA frame
pub fn load_still_frame(path: &Path) -> Result<NormalizedFrame, StillImageError> {
    let image = image::open(path)?;
    debug!(path = %path.display(), width = image.width(), height = image.height(), "Loaded still image");
    normalize_image(image)
}

/// Decode an in-memory encoded image as a normalized BGRA frame
pub fn decode_still_frame(bytes: &[u8]) -> Result<NormalizedFrame, StillImageError> {
    normalize_image(image::load_from_memory(bytes)?)
}

fn normalize_image(image: image::DynamicImage) -> Result<NormalizedFrame, StillImageError> {
    let rgba = image.into_rgba8();
    let (width, height) = rgba.dimensions();
    let raw = RawFrame {
        data: rgba.as_raw(),
        width,
        height,
        layout: PlaneLayout::Packed {
            order: PackedOrder::Rgba,
            row_stride: width as usize * 4,
        },
    };
    let data = convert_to_bgra(&raw)?;
    Ok(NormalizedFrame::new(data, width, height, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_png_file_becomes_bgra_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        RgbaImage::from_pixel(3, 2, Rgba([250, 10, 20, 255]))
            .save(&path)
            .unwrap();

        let frame = load_still_frame(&path).unwrap();
        assert_eq!((frame.width, frame.height), (3, 2));
        assert!(frame.is_well_formed());
        assert_eq!(&frame.data[..4], &[20, 10, 250, 255]);
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_still_frame(&dir.path().join("missing.png"));
        assert!(matches!(result, Err(StillImageError::Decode(_))));
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        assert!(decode_still_frame(b"not an image").is_err());
    }
}
