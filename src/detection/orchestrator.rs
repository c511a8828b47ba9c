// SPDX-License-Identifier: GPL-3.0-only

//! Per-session detection coordinator
//!
//! For every frame: lighting gate, localization under a deadline, band
//! decoding, then one atomic publish of the full reading set.
//!
//! At most one cycle runs at a time. A frame submitted while a cycle is in
//! flight is held as the single pending frame (a newer submission replaces
//! it) and runs as soon as the current cycle finishes; the caller that
//! started the cycle drives the pending frames too.
//!
//! Published state lives in `watch` channels: the reading set is an
//! immutable `Arc<ReadingSet>` swapped in one `send_replace`, so readers see
//! either the previous set or the next one, never a mix.

use super::localizer::{BoundingBox, Detection, DetectionError, DetectionRequest, ResistorLocalizer};
use crate::analysis::{LightingAnalyzer, LightingQuality};
use crate::backends::camera::types::NormalizedFrame;
use crate::codec::{self, CodecError, ColorBand};
use crate::config::Config;
use crate::constants::detection::INIT_TIMEOUT;
use crate::errors::{ScanError, ScanResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Lifecycle of a detection session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    /// Waiting for the localizer to initialize
    Initializing,
    Ready,
    Stopped,
    /// Localizer initialization failed; frames are ignored
    Failed(String),
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Initializing => write!(f, "initializing"),
            Self::Ready => write!(f, "ready"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

/// One decoded resistor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResistorReading {
    pub id: Uuid,
    pub value_ohms: f64,
    pub formatted: String,
    pub bands: Vec<ColorBand>,
    pub tolerance_percent: f64,
    pub bounding_box: BoundingBox,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

impl ResistorReading {
    /// Decode a band sequence found at `bounding_box`
    pub fn from_bands(
        bands: Vec<ColorBand>,
        bounding_box: BoundingBox,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, CodecError> {
        let decoded = codec::decode(&bands)?;
        Ok(Self {
            id: Uuid::new_v4(),
            value_ohms: decoded.ohms,
            formatted: decoded.formatted,
            bands,
            tolerance_percent: decoded.tolerance_percent,
            bounding_box,
            confidence: bounding_box.confidence,
            timestamp,
        })
    }
}

/// Everything published by one detection cycle
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReadingSet {
    /// Cycle that produced this set (0 = nothing published yet)
    pub cycle: u64,
    /// Sequence number of the frame the set was computed from
    pub frame_sequence: u64,
    pub frame_utc: Option<DateTime<Utc>>,
    pub lighting: LightingQuality,
    pub readings: Vec<ResistorReading>,
}

/// What `submit` did with a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The frame ran (and so did any frame that became pending meanwhile)
    Processed,
    /// A cycle was in flight; the frame is now the pending one
    Deferred { replaced_pending: bool },
    /// Not initialized, failed or stopped; the frame was dropped
    NotReady,
}

#[derive(Default)]
struct Gate {
    running: bool,
    pending: Option<NormalizedFrame>,
}

/// Clears `running` if a submit future is dropped mid-cycle
struct RunningGuard<'a> {
    gate: &'a Mutex<Gate>,
    armed: bool,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
            gate.running = false;
            gate.pending = None;
        }
    }
}

pub struct DetectionOrchestrator {
    localizer: Arc<dyn ResistorLocalizer>,
    analyzer: LightingAnalyzer,
    deadline: Duration,
    gate: Mutex<Gate>,
    cycles: AtomicU64,
    status_tx: watch::Sender<SessionStatus>,
    readings_tx: watch::Sender<Arc<ReadingSet>>,
    lighting_tx: watch::Sender<LightingQuality>,
}

impl DetectionOrchestrator {
    pub fn new(localizer: Arc<dyn ResistorLocalizer>, config: &Config) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Idle);
        let (readings_tx, _) = watch::channel(Arc::new(ReadingSet::default()));
        let (lighting_tx, _) = watch::channel(LightingQuality::Unknown);
        Self {
            localizer,
            analyzer: LightingAnalyzer::new(&config.lighting),
            deadline: config.detection.deadline(),
            gate: Mutex::new(Gate::default()),
            cycles: AtomicU64::new(0),
            status_tx,
            readings_tx,
            lighting_tx,
        }
    }

    /// Override the per-call localization deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn status(&self) -> SessionStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Receiver for the published reading set
    pub fn subscribe_readings(&self) -> watch::Receiver<Arc<ReadingSet>> {
        self.readings_tx.subscribe()
    }

    pub fn subscribe_lighting(&self) -> watch::Receiver<LightingQuality> {
        self.lighting_tx.subscribe()
    }

    /// Latest published reading set
    pub fn latest_readings(&self) -> Arc<ReadingSet> {
        Arc::clone(&self.readings_tx.borrow())
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.status_tx.borrow(), SessionStatus::Ready)
    }

    /// Initialize the localizer and move to Ready
    ///
    /// A failure is surfaced once through the status channel as `Failed`.
    pub async fn initialize(&self) -> ScanResult<()> {
        match self.status() {
            SessionStatus::Ready => return Ok(()),
            SessionStatus::Stopped => return Err(ScanError::NotReady),
            _ => {}
        }
        self.status_tx.send_replace(SessionStatus::Initializing);
        info!("Initializing localizer");

        let result = match tokio::time::timeout(INIT_TIMEOUT, self.localizer.initialize()).await {
            Ok(result) => result,
            Err(_) => Err(DetectionError::Timeout),
        };

        match result {
            Ok(()) => {
                self.status_tx.send_replace(SessionStatus::Ready);
                info!("Detection ready");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Localizer initialization failed");
                self.status_tx
                    .send_replace(SessionStatus::Failed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Stop accepting frames; a pending frame is dropped
    pub fn shutdown(&self) {
        self.lock_gate().pending = None;
        self.status_tx.send_replace(SessionStatus::Stopped);
        info!(cycles = self.cycles.load(Ordering::Relaxed), "Detection stopped");
    }

    /// Run a frame through the pipeline, or hold it if a cycle is in flight
    pub async fn submit(&self, frame: NormalizedFrame) -> SubmitOutcome {
        if !self.is_ready() {
            trace!(sequence = frame.sequence, "Frame ignored, detection not ready");
            return SubmitOutcome::NotReady;
        }

        {
            let mut gate = self.lock_gate();
            if gate.running {
                let replaced_pending = gate.pending.replace(frame).is_some();
                trace!(replaced_pending, "Cycle in flight, frame held");
                return SubmitOutcome::Deferred { replaced_pending };
            }
            gate.running = true;
        }

        let mut guard = RunningGuard {
            gate: &self.gate,
            armed: true,
        };
        let mut next = Some(frame);
        while let Some(frame) = next.take() {
            self.run_cycle(frame).await;

            {
                let mut gate = self.lock_gate();
                next = gate.pending.take();
                if next.is_some() && !self.is_ready() {
                    next = None;
                }
                if next.is_none() {
                    gate.running = false;
                    guard.armed = false;
                }
            }
        }
        SubmitOutcome::Processed
    }

    fn lock_gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_cycle(&self, frame: NormalizedFrame) {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;

        // Advisory only; detection runs whatever the lighting
        let lighting = self.analyzer.analyze_frame(&frame);
        self.lighting_tx.send_if_modified(|current| {
            let changed = *current != lighting;
            *current = lighting;
            changed
        });

        let deadline = Instant::now() + self.deadline;
        let request = DetectionRequest {
            pixels: &frame.data,
            width: frame.width,
            height: frame.height,
            deadline,
        };
        let detections =
            match tokio::time::timeout_at(deadline, self.localizer.detect(request)).await {
                Ok(Ok(detections)) => detections,
                Ok(Err(DetectionError::NotImplemented(what))) => {
                    debug!(cycle, what = %what, "Localizer not implemented");
                    return;
                }
                Ok(Err(e)) => {
                    warn!(cycle, error = %e, "Detection failed, keeping previous readings");
                    return;
                }
                Err(_) => {
                    warn!(
                        cycle,
                        deadline_ms = self.deadline.as_millis() as u64,
                        "Detection timed out, keeping previous readings"
                    );
                    return;
                }
            };

        let found = detections.len();
        let readings: Vec<ResistorReading> = detections
            .into_iter()
            .filter_map(|d| decode_detection(d, frame.captured_utc))
            .collect();
        let published = readings.len();

        self.readings_tx.send_replace(Arc::new(ReadingSet {
            cycle,
            frame_sequence: frame.sequence,
            frame_utc: Some(frame.captured_utc),
            lighting,
            readings,
        }));

        debug!(cycle, sequence = frame.sequence, found, published, %lighting, "Detection cycle published");
    }
}

fn decode_detection(detection: Detection, timestamp: DateTime<Utc>) -> Option<ResistorReading> {
    let Some(bands) = detection.bands else {
        trace!("Localization-only hit, no bands");
        return None;
    };

    let (bounding_box, changed) = detection.bounding_box.clamped();
    if changed {
        trace!(original = ?detection.bounding_box, clamped = ?bounding_box, "Clamped bounding box");
    }

    match ResistorReading::from_bands(bands, bounding_box, timestamp) {
        Ok(reading) => Some(reading),
        Err(e) => {
            debug!(error = %e, "Dropping undecodable detection");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::localizer::{FixedLocalizer, PendingModelLocalizer};
    use futures::future::BoxFuture;
    use ColorBand::*;

    fn gray_frame(sequence: u64) -> NormalizedFrame {
        NormalizedFrame::new(vec![128; 16 * 16 * 4], 16, 16, sequence)
    }

    fn orchestrator(localizer: Arc<dyn ResistorLocalizer>) -> DetectionOrchestrator {
        DetectionOrchestrator::new(localizer, &Config::default())
    }

    #[tokio::test]
    async fn test_frames_before_initialize_are_ignored() {
        let orch = orchestrator(Arc::new(PendingModelLocalizer::new()));
        assert_eq!(orch.submit(gray_frame(0)).await, SubmitOutcome::NotReady);
        assert_eq!(orch.latest_readings().cycle, 0);
    }

    #[tokio::test]
    async fn test_cycle_publishes_decoded_readings() {
        let localizer = Arc::new(FixedLocalizer::centered(vec![Yellow, Violet, Brown, Gold]));
        let orch = orchestrator(localizer);
        orch.initialize().await.unwrap();
        assert_eq!(orch.status(), SessionStatus::Ready);

        assert_eq!(orch.submit(gray_frame(3)).await, SubmitOutcome::Processed);

        let set = orch.latest_readings();
        assert_eq!(set.cycle, 1);
        assert_eq!(set.frame_sequence, 3);
        assert_eq!(set.lighting, LightingQuality::Good);
        assert_eq!(set.readings.len(), 1);
        let reading = &set.readings[0];
        assert_eq!(reading.value_ohms, 470.0);
        assert_eq!(reading.formatted, "470Ω");
        assert_eq!(reading.tolerance_percent, 5.0);
        assert_eq!(Some(reading.timestamp), set.frame_utc);
    }

    #[tokio::test]
    async fn test_undecodable_and_band_less_detections_are_dropped() {
        let good = Detection {
            bounding_box: BoundingBox::new(0.1, 0.1, 0.2, 0.1, 0.8),
            bands: Some(vec![Brown, Black, Orange, Gold]),
        };
        let bad = Detection {
            bounding_box: BoundingBox::new(0.5, 0.5, 0.2, 0.1, 0.7),
            bands: Some(vec![Gold, Gold, Gold]),
        };
        let no_bands = Detection {
            bounding_box: BoundingBox::new(0.5, 0.1, 0.2, 0.1, 0.6),
            bands: Option::None,
        };
        let orch = orchestrator(Arc::new(FixedLocalizer::new(vec![good, bad, no_bands])));
        orch.initialize().await.unwrap();
        orch.submit(gray_frame(0)).await;

        let set = orch.latest_readings();
        assert_eq!(set.readings.len(), 1);
        assert_eq!(set.readings[0].formatted, "10kΩ");
    }

    #[tokio::test]
    async fn test_out_of_range_box_is_clamped() {
        let detection = Detection {
            bounding_box: BoundingBox::new(0.9, -0.2, 0.3, 0.5, 1.4),
            bands: Some(vec![Red, Red, Red, Gold]),
        };
        let orch = orchestrator(Arc::new(FixedLocalizer::new(vec![detection])));
        orch.initialize().await.unwrap();
        orch.submit(gray_frame(0)).await;

        let reading = orch.latest_readings().readings[0].clone();
        let bbox = reading.bounding_box;
        assert_eq!(bbox.y, 0.0);
        assert!(bbox.x + bbox.width <= 1.0 + f32::EPSILON);
        assert_eq!(bbox.confidence, 1.0);
        assert_eq!(reading.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_timeout_keeps_previous_readings() {
        let localizer = Arc::new(
            FixedLocalizer::centered(vec![Yellow, Violet, Brown, Gold])
                .with_latency(Duration::from_millis(200)),
        );
        let orch = orchestrator(localizer).with_deadline(Duration::from_millis(20));
        orch.initialize().await.unwrap();

        assert_eq!(orch.submit(gray_frame(0)).await, SubmitOutcome::Processed);
        assert_eq!(orch.latest_readings().cycle, 0);
        assert!(orch.latest_readings().readings.is_empty());
    }

    struct FailingInit;

    impl ResistorLocalizer for FailingInit {
        fn initialize(&self) -> BoxFuture<'_, Result<(), DetectionError>> {
            Box::pin(async { Err(DetectionError::Failed("model file missing".into())) })
        }

        fn is_initialized(&self) -> bool {
            false
        }

        fn detect<'a>(
            &'a self,
            _request: DetectionRequest<'a>,
        ) -> BoxFuture<'a, Result<Vec<Detection>, DetectionError>> {
            Box::pin(async { Err(DetectionError::NotReady) })
        }
    }

    #[tokio::test]
    async fn test_failed_initialize_is_surfaced_in_status() {
        let orch = orchestrator(Arc::new(FailingInit));
        let err = orch.initialize().await.unwrap_err();
        assert!(matches!(err, ScanError::Detection(_)));
        assert_eq!(
            orch.status(),
            SessionStatus::Failed("model file missing".to_string())
        );
        assert_eq!(orch.submit(gray_frame(0)).await, SubmitOutcome::NotReady);
    }

    #[tokio::test]
    async fn test_shutdown_stops_processing() {
        let orch = orchestrator(Arc::new(PendingModelLocalizer::new()));
        orch.initialize().await.unwrap();
        orch.shutdown();
        assert_eq!(orch.status(), SessionStatus::Stopped);
        assert_eq!(orch.submit(gray_frame(0)).await, SubmitOutcome::NotReady);
        assert!(matches!(orch.initialize().await, Err(ScanError::NotReady)));
    }
}
