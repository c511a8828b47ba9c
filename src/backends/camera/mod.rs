// SPDX-License-Identifier: GPL-3.0-only
// Camera backends behind one frame-source capability

//! Camera backend abstraction
//!
//! Every capture backend implements [`FrameSource`]; the rest of the
//! pipeline only sees normalized BGRA frames arriving in a mailbox.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │     ScanSession     │  ← pumps frames into the orchestrator
//! └──────────┬──────────┘
//!            │ FrameReceiver (capacity 1, latest wins)
//!            ▼
//! ┌─────────────────────┐
//! │  FrameSource Trait  │  ← start / stop / subscribe
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//! ┌─────────┐  ┌─────────┐
//! │Synthetic│  │  V4L2   │  ← capture thread: throttle → convert → post
//! └─────────┘  └─────────┘
//! ```

pub mod dispatcher;
pub mod frame_loop;
pub mod mailbox;
pub mod synthetic;
pub mod throttle;
pub mod types;
#[cfg(all(target_os = "linux", feature = "v4l2"))]
pub mod v4l2;

pub use dispatcher::{DispatchStats, FrameDispatcher};
pub use mailbox::{FrameReceiver, FrameSender, frame_mailbox};
pub use synthetic::{SyntheticCamera, SyntheticLayout};
pub use throttle::FrameThrottle;
pub use types::*;

use crate::config::Config;
use tracing::info;

/// Capability every capture backend provides
///
/// Frames are delivered through the receiver returned by
/// [`subscribe`](FrameSource::subscribe), at most once per accepted frame.
pub trait FrameSource: Send {
    /// Open the device and begin delivering frames
    ///
    /// Idempotent while running. Device acquisition happens on the capture
    /// thread; a failure there is returned here and leaves nothing open.
    fn start(&mut self) -> BackendResult<()>;

    /// Release the device and end the capture thread
    ///
    /// Idempotent and safe at any time. Closes the frame mailbox, so a
    /// pending `recv()` resolves to `None`.
    fn stop(&mut self) -> BackendResult<()>;

    /// Whether the capture thread is running
    fn is_running(&self) -> bool;

    /// Receiver for normalized frames
    fn subscribe(&self) -> FrameReceiver;

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Get the camera device in use (if known)
    fn device(&self) -> Option<&CameraDevice>;

    /// Dispatch counters of the current (or last) capture run
    fn stats(&self) -> DispatchStats;
}

/// Whether a backend is compiled into this build
pub fn is_backend_available(backend_type: CameraBackendType) -> bool {
    match backend_type {
        CameraBackendType::Synthetic => true,
        CameraBackendType::V4l2 => cfg!(all(target_os = "linux", feature = "v4l2")),
    }
}

/// Get a concrete backend instance for the requested type
pub fn get_backend_for_type(
    backend_type: CameraBackendType,
    config: &Config,
) -> BackendResult<Box<dyn FrameSource>> {
    info!(backend = %backend_type, "Creating camera backend");
    match backend_type {
        CameraBackendType::Synthetic => Ok(Box::new(SyntheticCamera::new(&config.capture))),
        #[cfg(all(target_os = "linux", feature = "v4l2"))]
        CameraBackendType::V4l2 => Ok(Box::new(v4l2::V4l2Camera::new(config))),
        #[cfg(not(all(target_os = "linux", feature = "v4l2")))]
        CameraBackendType::V4l2 => Err(BackendError::NotAvailable(
            "built without the v4l2 feature".to_string(),
        )),
    }
}

/// List the devices a backend can open
pub fn enumerate_cameras(backend_type: CameraBackendType) -> Vec<CameraDevice> {
    match backend_type {
        CameraBackendType::Synthetic => vec![synthetic::synthetic_device()],
        #[cfg(all(target_os = "linux", feature = "v4l2"))]
        CameraBackendType::V4l2 => v4l2::enumerate_devices(),
        #[cfg(not(all(target_os = "linux", feature = "v4l2")))]
        CameraBackendType::V4l2 => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_backend_is_always_available() {
        assert!(is_backend_available(CameraBackendType::Synthetic));
        let source = get_backend_for_type(CameraBackendType::Synthetic, &Config::default()).unwrap();
        assert_eq!(source.backend_type(), CameraBackendType::Synthetic);
        assert!(!source.is_running());
        assert_eq!(enumerate_cameras(CameraBackendType::Synthetic).len(), 1);
    }

    #[cfg(not(all(target_os = "linux", feature = "v4l2")))]
    #[test]
    fn test_v4l2_without_feature_is_not_available() {
        let result = get_backend_for_type(CameraBackendType::V4l2, &Config::default());
        assert!(matches!(result, Err(BackendError::NotAvailable(_))));
    }
}
