// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanning pipeline
//!
//! Each layer owns a narrow error enum; [`ScanError`] folds them into the
//! four categories callers act on:
//!
//! - configuration problems (no camera, device open/configure failure)
//! - invalid arguments (band sequences the codec cannot decode)
//! - not-ready (detection before the collaborator finished initializing)
//! - detection failures reported by the external collaborator
//!
//! Degenerate pixel input is not an error at all: it degrades to
//! [`LightingQuality::Unknown`](crate::analysis::LightingQuality::Unknown).

use crate::backends::camera::BackendError;
use crate::codec::CodecError;
use crate::detection::DetectionError;
use thiserror::Error;

/// Result type alias using ScanError
pub type ScanResult<T> = Result<T, ScanError>;

/// Top-level error for session and orchestrator operations
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// Camera device missing or could not be opened/configured
    #[error("Configuration error: {0}")]
    Configuration(#[from] BackendError),
    /// A band sequence or band role the lookup tables do not support
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] CodecError),
    /// Detection requested before initialization completed
    #[error("Detection service is not ready")]
    NotReady,
    /// The localization collaborator failed
    #[error("Detection failed: {0}")]
    Detection(String),
    /// Configuration file could not be read or parsed
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<DetectionError> for ScanError {
    fn from(err: DetectionError) -> Self {
        match err {
            DetectionError::NotReady => ScanError::NotReady,
            other => ScanError::Detection(other.to_string()),
        }
    }
}

/// Errors raised while loading or validating [`Config`](crate::config::Config)
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("Failed to read config {path}: {message}")]
    Io { path: String, message: String },
    /// The file is not valid JSON for the config schema
    #[error("Failed to parse config {path}: {message}")]
    Parse { path: String, message: String },
    /// A value is outside its allowed range
    #[error("Invalid config value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}
