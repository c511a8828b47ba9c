// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendType {
    /// Virtual sensor producing test frames (always available)
    #[default]
    Synthetic,
    /// Video4Linux2 capture device (Linux, `v4l2` feature)
    V4l2,
}

impl CameraBackendType {
    /// All backend types, for listing
    pub const ALL: [CameraBackendType; 2] = [CameraBackendType::Synthetic, CameraBackendType::V4l2];
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::Synthetic => write!(f, "synthetic"),
            CameraBackendType::V4l2 => write!(f, "v4l2"),
        }
    }
}

impl std::str::FromStr for CameraBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synthetic" | "virtual" => Ok(CameraBackendType::Synthetic),
            "v4l2" | "v4l" => Ok(CameraBackendType::V4l2),
            other => Err(format!("unknown camera backend '{}'", other)),
        }
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraDevice {
    pub name: String,
    pub path: String,           // Device node (e.g. /dev/video0) or virtual id
    pub driver: Option<String>, // Kernel driver name when known
}

/// Framerate as a fraction (numerator/denominator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from an integer (e.g., 15 becomes 15/1)
    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Time between two frames at this rate
    ///
    /// A zero rate has no meaningful interval and maps to `Duration::ZERO`,
    /// which lets every frame through.
    pub fn frame_interval(&self) -> Duration {
        if self.num == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(1_000_000_000u64 * self.denom as u64 / self.num as u64)
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 15, denom: 1 }
    }
}

/// Camera format specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: Framerate,
    pub pixel_format: PixelFormat,
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} @ {}fps ({})",
            self.width, self.height, self.framerate, self.pixel_format
        )
    }
}

/// Native pixel formats a backend may deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// BGRA - 32-bit with alpha (B G R A byte order)
    /// This is the canonical format used throughout the pipeline after conversion
    Bgra,
    /// RGBA - 32-bit with alpha (R G B A byte order)
    Rgba,
    /// I420 - Planar 4:2:0 (separate Y, U, V planes)
    I420,
    /// NV12 - Semi-planar 4:2:0 (Y plane + interleaved UV plane)
    Nv12,
    /// NV21 - Semi-planar 4:2:0 (Y plane + interleaved VU plane)
    Nv21,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    Yuyv,
}

impl PixelFormat {
    /// Check if this format carries luma/chroma samples
    pub fn is_yuv(&self) -> bool {
        matches!(self, Self::I420 | Self::Nv12 | Self::Nv21 | Self::Yuyv)
    }

    /// Four-character code as used by V4L2
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::Bgra => *b"AR24",
            Self::Rgba => *b"AB24",
            Self::I420 => *b"YU12",
            Self::Nv12 => *b"NV12",
            Self::Nv21 => *b"NV21",
            Self::Yuyv => *b"YUYV",
        }
    }

    /// Parse a V4L2 four-character code
    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"AR24" | b"BGR4" | b"XR24" => Some(Self::Bgra),
            b"AB24" | b"XB24" => Some(Self::Rgba),
            b"YU12" => Some(Self::I420),
            b"NV12" => Some(Self::Nv12),
            b"NV21" => Some(Self::Nv21),
            b"YUYV" => Some(Self::Yuyv),
            _ => None,
        }
    }

    /// Minimum bytes for one row without padding
    pub fn min_row_bytes(&self, width: u32) -> usize {
        match self {
            Self::Bgra | Self::Rgba => width as usize * 4,
            Self::Yuyv => width.div_ceil(2) as usize * 4,
            // Luma row of the planar formats
            Self::I420 | Self::Nv12 | Self::Nv21 => width as usize,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.fourcc();
        write!(f, "{}", String::from_utf8_lossy(&code))
    }
}

/// Location of one sample plane inside a raw buffer
///
/// `row_stride` is the distance in bytes between the first samples of two
/// consecutive rows (includes padding); `pixel_stride` is the distance
/// between two horizontally adjacent samples of this plane (2 for the
/// interleaved chroma plane of NV12/NV21).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneDesc {
    pub offset: usize,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl PlaneDesc {
    pub fn new(offset: usize, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            offset,
            row_stride,
            pixel_stride,
        }
    }

    /// Byte index of sample (`row`, `col`) within the backing buffer
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        self.offset + row * self.row_stride + col * self.pixel_stride
    }
}

/// Byte order of an already-packed 4-byte pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedOrder {
    Bgra,
    Rgba,
}

/// How the bytes of a [`RawFrame`] are arranged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneLayout {
    /// Planar or semi-planar 4:2:0 with explicit per-plane strides
    Yuv420 {
        y: PlaneDesc,
        u: PlaneDesc,
        v: PlaneDesc,
    },
    /// Packed 4:2:2, Y0 U Y1 V
    Yuyv422 { row_stride: usize },
    /// Already 4 bytes per pixel
    Packed {
        order: PackedOrder,
        row_stride: usize,
    },
}

impl PlaneLayout {
    /// Tightly packed I420 layout for a frame of the given size
    pub fn i420(width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        let u_offset = w * h;
        let v_offset = u_offset + cw * ch;
        PlaneLayout::Yuv420 {
            y: PlaneDesc::new(0, w, 1),
            u: PlaneDesc::new(u_offset, cw, 1),
            v: PlaneDesc::new(v_offset, cw, 1),
        }
    }

    /// NV12 layout with the given luma/chroma row stride
    pub fn nv12(height: u32, row_stride: usize) -> Self {
        let uv_offset = row_stride * height as usize;
        PlaneLayout::Yuv420 {
            y: PlaneDesc::new(0, row_stride, 1),
            u: PlaneDesc::new(uv_offset, row_stride, 2),
            v: PlaneDesc::new(uv_offset + 1, row_stride, 2),
        }
    }

    /// NV21 layout (V before U in the interleaved plane)
    pub fn nv21(height: u32, row_stride: usize) -> Self {
        let vu_offset = row_stride * height as usize;
        PlaneLayout::Yuv420 {
            y: PlaneDesc::new(0, row_stride, 1),
            u: PlaneDesc::new(vu_offset + 1, row_stride, 2),
            v: PlaneDesc::new(vu_offset, row_stride, 2),
        }
    }

    /// I420 layout with a padded luma stride (chroma stride is half of it)
    pub fn i420_strided(height: u32, row_stride: usize) -> Self {
        let chroma_stride = row_stride.div_ceil(2);
        let chroma_rows = (height as usize).div_ceil(2);
        let u_offset = row_stride * height as usize;
        let v_offset = u_offset + chroma_stride * chroma_rows;
        PlaneLayout::Yuv420 {
            y: PlaneDesc::new(0, row_stride, 1),
            u: PlaneDesc::new(u_offset, chroma_stride, 1),
            v: PlaneDesc::new(v_offset, chroma_stride, 1),
        }
    }

    /// Layout for a buffer in `format` whose first plane uses `row_stride`
    pub fn for_format(format: PixelFormat, height: u32, row_stride: usize) -> Self {
        match format {
            PixelFormat::Bgra => PlaneLayout::Packed {
                order: PackedOrder::Bgra,
                row_stride,
            },
            PixelFormat::Rgba => PlaneLayout::Packed {
                order: PackedOrder::Rgba,
                row_stride,
            },
            PixelFormat::I420 => Self::i420_strided(height, row_stride),
            PixelFormat::Nv12 => Self::nv12(height, row_stride),
            PixelFormat::Nv21 => Self::nv21(height, row_stride),
            PixelFormat::Yuyv => PlaneLayout::Yuyv422 { row_stride },
        }
    }
}

/// A native frame as delivered by the hardware, borrowed for the duration
/// of one capture callback
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub layout: PlaneLayout,
}

/// A frame in the pipeline's canonical packed BGRA format
///
/// The buffer is owned: whichever stage holds the frame owns it outright,
/// and handing it on moves it.
#[derive(Clone)]
pub struct NormalizedFrame {
    /// BGRA8888 pixels, exactly `width * height * 4` bytes, no padding
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic capture time
    pub captured_at: Instant,
    /// Wall-clock capture time
    pub captured_utc: DateTime<Utc>,
    /// Per-source sequence number of accepted frames
    pub sequence: u64,
}

impl NormalizedFrame {
    /// Bytes per pixel of the canonical format
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Wrap an already-normalized buffer, stamping it with the current time
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            captured_at: Instant::now(),
            captured_utc: Utc::now(),
            sequence,
        }
    }

    /// Expected buffer length for the frame dimensions
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::BYTES_PER_PIXEL
    }

    /// Whether the buffer length matches the dimensions
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == Self::expected_len(self.width, self.height)
    }
}

impl std::fmt::Debug for NormalizedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .field("sequence", &self.sequence)
            .field("captured_utc", &self.captured_utc)
            .finish()
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Backend is not available on this system or build
    #[error("Backend not available: {0}")]
    NotAvailable(String),
    /// Failed to open or configure the device
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
    /// Camera device not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    /// Format not supported
    #[error("Format not supported: {0}")]
    FormatNotSupported(String),
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err.to_string())
    }
}
