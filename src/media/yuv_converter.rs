// SPDX-License-Identifier: GPL-3.0-only

//! CPU conversion of native sensor buffers to packed BGRA
//!
//! Every native layout a backend can produce ends up here, so the rest of
//! the pipeline only ever sees one pixel format. YUV input goes through the
//! BT.601 full-range matrix:
//!
//! ```text
//! R = Y + 1.402    (V - 128)
//! G = Y - 0.344136 (U - 128) - 0.714136 (V - 128)
//! B = Y + 1.772    (U - 128)
//! ```
//!
//! Chroma for 4:2:0 layouts is sampled at `(row / 2, col / 2)` using the
//! chroma plane's own strides, which covers I420, NV12 and NV21 as well as
//! row-padded variants of each. Buffers that are already packed are copied
//! row by row to strip stride padding, without any color math.
//!
//! All bounds are checked up front; the per-pixel loops never index past
//! what was validated.

use crate::backends::camera::types::{PackedOrder, PlaneDesc, PlaneLayout, RawFrame};
use thiserror::Error;

/// Reasons a raw buffer cannot be converted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("frame has zero dimension ({width}x{height})")]
    ZeroDimension { width: u32, height: u32 },
    #[error("{plane} plane needs {needed} bytes but buffer holds {len}")]
    PlaneOutOfBounds {
        plane: &'static str,
        needed: usize,
        len: usize,
    },
    #[error("{plane} row stride {stride} is smaller than the {min} bytes a row needs")]
    StrideTooSmall {
        plane: &'static str,
        stride: usize,
        min: usize,
    },
}

/// Convert a raw frame to a freshly allocated BGRA buffer
pub fn convert_to_bgra(frame: &RawFrame<'_>) -> Result<Vec<u8>, ConvertError> {
    let mut out = Vec::new();
    convert_into(frame, &mut out)?;
    Ok(out)
}

/// Convert a raw frame into `out`, reusing its allocation
///
/// On success `out.len()` is exactly `width * height * 4`, independent of
/// any stride padding in the source. On error `out` is left empty.
pub fn convert_into(frame: &RawFrame<'_>, out: &mut Vec<u8>) -> Result<(), ConvertError> {
    out.clear();
    validate(frame)?;

    let pixel_count = frame.width as usize * frame.height as usize;
    out.resize(pixel_count * 4, 0);

    match frame.layout {
        PlaneLayout::Yuv420 { y, u, v } => yuv420_to_bgra(frame, y, u, v, out),
        PlaneLayout::Yuyv422 { row_stride } => yuyv_to_bgra(frame, row_stride, out),
        PlaneLayout::Packed { order, row_stride } => packed_to_bgra(frame, order, row_stride, out),
    }

    Ok(())
}

/// BT.601 full-range YCbCr to a BGRA pixel
#[inline]
pub fn yuv_to_bgra_pixel(y: u8, u: u8, v: u8) -> [u8; 4] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402 * v;
    let g = y - 0.344136 * u - 0.714136 * v;
    let b = y + 1.772 * u;

    [clamp_channel(b), clamp_channel(g), clamp_channel(r), 255]
}

/// Inverse of [`yuv_to_bgra_pixel`]: BT.601 full-range (Y, U, V) for an RGB color
pub fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = 128.0 + (b - y) / 1.772;
    let v = 128.0 + (r - y) / 1.402;
    (clamp_channel(y), clamp_channel(u), clamp_channel(v))
}

#[inline]
fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Highest byte index touched when reading `rows` x `cols` samples of a plane
fn last_index(plane: &PlaneDesc, rows: usize, cols: usize) -> Option<usize> {
    let row_part = (rows - 1).checked_mul(plane.row_stride)?;
    let col_part = (cols - 1).checked_mul(plane.pixel_stride)?;
    plane.offset.checked_add(row_part)?.checked_add(col_part)
}

fn check_plane(
    name: &'static str,
    plane: &PlaneDesc,
    rows: usize,
    cols: usize,
    len: usize,
) -> Result<(), ConvertError> {
    match last_index(plane, rows, cols) {
        Some(last) if last < len => Ok(()),
        Some(last) => Err(ConvertError::PlaneOutOfBounds {
            plane: name,
            needed: last + 1,
            len,
        }),
        None => Err(ConvertError::PlaneOutOfBounds {
            plane: name,
            needed: usize::MAX,
            len,
        }),
    }
}

fn check_packed_rows(
    name: &'static str,
    row_stride: usize,
    row_bytes: usize,
    rows: usize,
    len: usize,
) -> Result<(), ConvertError> {
    if row_stride < row_bytes {
        return Err(ConvertError::StrideTooSmall {
            plane: name,
            stride: row_stride,
            min: row_bytes,
        });
    }
    let needed = (rows - 1)
        .checked_mul(row_stride)
        .and_then(|n| n.checked_add(row_bytes))
        .unwrap_or(usize::MAX);
    if needed > len {
        return Err(ConvertError::PlaneOutOfBounds {
            plane: name,
            needed,
            len,
        });
    }
    Ok(())
}

fn validate(frame: &RawFrame<'_>) -> Result<(), ConvertError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(ConvertError::ZeroDimension {
            width: frame.width,
            height: frame.height,
        });
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let len = frame.data.len();

    match frame.layout {
        PlaneLayout::Yuv420 { y, u, v } => {
            let chroma_w = width.div_ceil(2);
            let chroma_h = height.div_ceil(2);
            check_plane("Y", &y, height, width, len)?;
            check_plane("U", &u, chroma_h, chroma_w, len)?;
            check_plane("V", &v, chroma_h, chroma_w, len)?;
        }
        PlaneLayout::Yuyv422 { row_stride } => {
            check_packed_rows("YUYV", row_stride, width.div_ceil(2) * 4, height, len)?;
        }
        PlaneLayout::Packed { row_stride, .. } => {
            check_packed_rows("packed", row_stride, width * 4, height, len)?;
        }
    }

    Ok(())
}

fn yuv420_to_bgra(frame: &RawFrame<'_>, y: PlaneDesc, u: PlaneDesc, v: PlaneDesc, out: &mut [u8]) {
    let width = frame.width as usize;
    let data = frame.data;

    for (row, out_row) in out.chunks_exact_mut(width * 4).enumerate() {
        let chroma_row = row / 2;
        for (col, pixel) in out_row.chunks_exact_mut(4).enumerate() {
            let chroma_col = col / 2;
            let luma = data[y.index(row, col)];
            let cb = data[u.index(chroma_row, chroma_col)];
            let cr = data[v.index(chroma_row, chroma_col)];
            pixel.copy_from_slice(&yuv_to_bgra_pixel(luma, cb, cr));
        }
    }
}

fn yuyv_to_bgra(frame: &RawFrame<'_>, row_stride: usize, out: &mut [u8]) {
    let width = frame.width as usize;
    let data = frame.data;

    for (row, out_row) in out.chunks_exact_mut(width * 4).enumerate() {
        let src_row = &data[row * row_stride..];
        for (col, pixel) in out_row.chunks_exact_mut(4).enumerate() {
            // Y0 U Y1 V - each 4-byte group encodes 2 pixels
            let group = (col / 2) * 4;
            let luma = src_row[group + (col % 2) * 2];
            let cb = src_row[group + 1];
            let cr = src_row[group + 3];
            pixel.copy_from_slice(&yuv_to_bgra_pixel(luma, cb, cr));
        }
    }
}

fn packed_to_bgra(frame: &RawFrame<'_>, order: PackedOrder, row_stride: usize, out: &mut [u8]) {
    let row_bytes = frame.width as usize * 4;
    let data = frame.data;

    for (row, out_row) in out.chunks_exact_mut(row_bytes).enumerate() {
        let start = row * row_stride;
        out_row.copy_from_slice(&data[start..start + row_bytes]);
        if order == PackedOrder::Rgba {
            for pixel in out_row.chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
        }
    }
}
