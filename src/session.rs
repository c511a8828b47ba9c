// SPDX-License-Identifier: GPL-3.0-only

//! One scanning session: a frame source wired to a detection orchestrator
//!
//! `start()` brings the localizer up, starts capture and spawns a task
//! that pumps the frame mailbox into the orchestrator. `stop()` tears it
//! down in reverse. A stopped session, or one whose capture failed to
//! start, is not restarted; create a new one.

use crate::backends::camera::{FrameSource, get_backend_for_type};
use crate::config::Config;
use crate::detection::{DetectionOrchestrator, ResistorLocalizer, SubmitOutcome};
use crate::errors::ScanResult;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Frames the pump task handed to the orchestrator, by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub processed: u64,
    pub deferred: u64,
    pub not_ready: u64,
}

pub struct ScanSession {
    source: Box<dyn FrameSource>,
    orchestrator: Arc<DetectionOrchestrator>,
    pump: Option<JoinHandle<PumpStats>>,
    last_pump_stats: PumpStats,
}

impl ScanSession {
    pub fn new(source: Box<dyn FrameSource>, orchestrator: Arc<DetectionOrchestrator>) -> Self {
        Self {
            source,
            orchestrator,
            pump: None,
            last_pump_stats: PumpStats::default(),
        }
    }

    /// Build a session for the configured backend
    pub fn from_config(config: &Config, localizer: Arc<dyn ResistorLocalizer>) -> ScanResult<Self> {
        let source = get_backend_for_type(config.backend, config)?;
        let orchestrator = Arc::new(DetectionOrchestrator::new(localizer, config));
        Ok(Self::new(source, orchestrator))
    }

    pub fn orchestrator(&self) -> &Arc<DetectionOrchestrator> {
        &self.orchestrator
    }

    pub fn source(&self) -> &dyn FrameSource {
        self.source.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.pump.is_some()
    }

    /// Stats of the pump task from the last `stop()`
    pub fn pump_stats(&self) -> PumpStats {
        self.last_pump_stats
    }

    /// Initialize detection, start capture and begin pumping frames
    ///
    /// Idempotent while running.
    pub async fn start(&mut self) -> ScanResult<()> {
        if self.pump.is_some() {
            return Ok(());
        }

        self.orchestrator.initialize().await?;
        if let Err(e) = self.source.start() {
            // No frames will ever arrive; do not leave detection Ready
            self.orchestrator.shutdown();
            return Err(e.into());
        }

        let frames = self.source.subscribe();
        let orchestrator = Arc::clone(&self.orchestrator);
        self.pump = Some(tokio::spawn(async move {
            let mut stats = PumpStats::default();
            while let Some(frame) = frames.recv().await {
                match orchestrator.submit(frame).await {
                    SubmitOutcome::Processed => stats.processed += 1,
                    SubmitOutcome::Deferred { .. } => stats.deferred += 1,
                    SubmitOutcome::NotReady => stats.not_ready += 1,
                }
            }
            debug!(?stats, "Frame pump finished");
            stats
        }));

        info!(
            backend = %self.source.backend_type(),
            device = self.source.device().map(|d| d.name.as_str()).unwrap_or("unknown"),
            "Scan session started"
        );
        Ok(())
    }

    /// Stop capture, drain the pump task and shut detection down
    ///
    /// Idempotent.
    pub async fn stop(&mut self) -> ScanResult<()> {
        // Closes the mailbox, which ends the pump loop
        self.source.stop()?;

        if let Some(pump) = self.pump.take() {
            match pump.await {
                Ok(stats) => self.last_pump_stats = stats,
                Err(e) => warn!(error = %e, "Frame pump task failed"),
            }
            self.orchestrator.shutdown();
            info!(stats = ?self.source.stats(), "Scan session stopped");
        }
        Ok(())
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            if let Err(e) = self.source.stop() {
                warn!(error = %e, "Failed to stop frame source");
            }
            pump.abort();
            self.orchestrator.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::SyntheticCamera;
    use crate::codec::ColorBand;
    use crate::config::CaptureSettings;
    use crate::detection::{FixedLocalizer, SessionStatus};
    use std::time::Duration;

    fn small_config() -> Config {
        Config {
            capture: CaptureSettings {
                width: 32,
                height: 24,
                target_fps: 30,
                sensor_fps: 60,
                synthetic_fill: [128, 128, 128],
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_session_publishes_readings_from_synthetic_camera() {
        let config = small_config();
        let localizer = Arc::new(FixedLocalizer::centered(vec![
            ColorBand::Brown,
            ColorBand::Black,
            ColorBand::Red,
            ColorBand::Gold,
        ]));
        let mut session = ScanSession::from_config(&config, localizer).unwrap();
        let mut readings = session.orchestrator().subscribe_readings();

        session.start().await.unwrap();
        assert!(session.is_running());
        assert!(session.source().is_running());

        tokio::time::timeout(Duration::from_secs(2), readings.changed())
            .await
            .unwrap()
            .unwrap();
        let set = readings.borrow_and_update().clone();
        assert_eq!(set.readings.len(), 1);
        assert_eq!(set.readings[0].formatted, "1kΩ");

        session.stop().await.unwrap();
        assert!(!session.is_running());
        assert!(!session.source().is_running());
        assert_eq!(session.orchestrator().status(), SessionStatus::Stopped);
        assert!(session.pump_stats().processed > 0);

        // Second stop is a no-op
        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_fails_on_bad_capture_config() {
        let mut config = small_config();
        config.capture.width = 0;
        let source = Box::new(SyntheticCamera::new(&config.capture));
        let orchestrator = Arc::new(DetectionOrchestrator::new(
            Arc::new(FixedLocalizer::new(Vec::new())),
            &config,
        ));
        let mut session = ScanSession::new(source, orchestrator);

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, crate::errors::ScanError::Configuration(_)));
        assert!(!session.is_running());
        assert_eq!(session.orchestrator().status(), SessionStatus::Stopped);
    }
}
