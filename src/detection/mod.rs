// SPDX-License-Identifier: GPL-3.0-only

//! Resistor detection: the localizer seam and the per-session orchestrator

pub mod localizer;
pub mod orchestrator;

pub use localizer::{
    BoundingBox, Detection, DetectionError, DetectionRequest, FixedLocalizer,
    PendingModelLocalizer, ResistorLocalizer,
};
pub use orchestrator::{
    DetectionOrchestrator, ReadingSet, ResistorReading, SessionStatus, SubmitOutcome,
};
