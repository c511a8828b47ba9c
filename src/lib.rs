// SPDX-License-Identifier: GPL-3.0-only

//! Resistor Scan - reads resistor color bands from a live camera feed
//!
//! This library provides the frame-to-reading pipeline: native frame
//! capture and normalization, frame-rate throttling, a lighting gate, the
//! color-band codec, and the detection orchestrator that publishes
//! readings.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Frame sources (synthetic, V4L2) behind one trait
//! - [`media`]: Pixel format conversion to BGRA
//! - [`analysis`]: Lighting-quality classification
//! - [`codec`]: Color bands to resistance values and display strings
//! - [`detection`]: Localizer seam and per-session orchestrator
//! - [`session`]: Wiring a frame source to an orchestrator
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let config = Config::load_default()?;
//! let localizer = Arc::new(PendingModelLocalizer::new());
//! let mut session = ScanSession::from_config(&config, localizer)?;
//! let mut readings = session.orchestrator().subscribe_readings();
//! session.start().await?;
//! readings.changed().await?;
//! println!("{:?}", readings.borrow().readings);
//! ```

pub mod analysis;
pub mod backends;
pub mod codec;
pub mod config;
pub mod constants;
pub mod detection;
pub mod errors;
pub mod logging;
pub mod media;
pub mod session;

// Re-export commonly used types
pub use analysis::{LightingAnalyzer, LightingQuality};
pub use backends::camera::{CameraBackendType, FrameSource, NormalizedFrame};
pub use codec::{ColorBand, calculate_resistance, format_resistance};
pub use config::Config;
pub use detection::{DetectionOrchestrator, ReadingSet, ResistorReading, SessionStatus};
pub use errors::{ScanError, ScanResult};
pub use session::ScanSession;
