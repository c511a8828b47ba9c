// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame path from the hardware callback into the pipeline
//!
//! Runs on the capture thread for every native frame:
//! throttle -> convert to BGRA -> post to the mailbox. A frame that fails
//! conversion is dropped with a debug log; the capture loop keeps going.

use super::mailbox::{FrameSender, PostOutcome};
use super::throttle::FrameThrottle;
use super::types::{Framerate, NormalizedFrame, RawFrame};
use crate::constants::timing::FRAME_LOG_INTERVAL;
use crate::media::yuv_converter::convert_to_bgra;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, trace};

/// Counters shared between the capture thread and observers
#[derive(Debug, Default)]
pub struct DispatchCounters {
    received: AtomicU64,
    accepted: AtomicU64,
    throttled: AtomicU64,
    malformed: AtomicU64,
    replaced: AtomicU64,
}

impl DispatchCounters {
    pub fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            received: self.received.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DispatchCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DispatchStats {
    /// Native frames handed to the dispatcher
    pub received: u64,
    /// Frames converted and posted
    pub accepted: u64,
    /// Frames rejected by the rate limiter
    pub throttled: u64,
    /// Frames whose buffer did not match the declared layout
    pub malformed: u64,
    /// Posted frames overwritten before anyone consumed them
    pub replaced: u64,
}

/// What happened to one native frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Throttled,
    Malformed,
    Delivered,
    ReplacedPending,
    /// Consumer side closed; frame dropped
    Closed,
}

pub struct FrameDispatcher {
    throttle: FrameThrottle,
    sender: FrameSender,
    counters: Arc<DispatchCounters>,
    next_sequence: u64,
}

impl FrameDispatcher {
    pub fn new(target_rate: Framerate, sender: FrameSender) -> Self {
        Self {
            throttle: FrameThrottle::from_framerate(target_rate),
            sender,
            counters: Arc::new(DispatchCounters::default()),
            next_sequence: 0,
        }
    }

    /// Shared handle to this dispatcher's counters
    pub fn counters(&self) -> Arc<DispatchCounters> {
        Arc::clone(&self.counters)
    }

    /// Handle one native frame arriving at `now`
    ///
    /// Throttle check, conversion, then the throttle commit and the post.
    pub fn on_raw_frame(&mut self, raw: &RawFrame<'_>, now: Instant) -> DispatchOutcome {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        if !self.throttle.is_due(now) {
            self.counters.throttled.fetch_add(1, Ordering::Relaxed);
            trace!("Frame throttled");
            return DispatchOutcome::Throttled;
        }

        let data = match convert_to_bgra(raw) {
            Ok(data) => data,
            Err(e) => {
                self.counters.malformed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    width = raw.width,
                    height = raw.height,
                    bytes = raw.data.len(),
                    error = %e,
                    "Dropping malformed frame"
                );
                return DispatchOutcome::Malformed;
            }
        };
        // Only a converted frame consumes the interval
        self.throttle.commit(now);

        let frame = NormalizedFrame {
            data,
            width: raw.width,
            height: raw.height,
            captured_at: now,
            captured_utc: Utc::now(),
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        let outcome = match self.sender.post(frame) {
            PostOutcome::Delivered => DispatchOutcome::Delivered,
            PostOutcome::ReplacedPending => {
                self.counters.replaced.fetch_add(1, Ordering::Relaxed);
                DispatchOutcome::ReplacedPending
            }
            PostOutcome::Closed => return DispatchOutcome::Closed,
        };

        let accepted = self.counters.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        if accepted % FRAME_LOG_INTERVAL == 1 {
            let stats = self.counters.snapshot();
            debug!(
                accepted = stats.accepted,
                throttled = stats.throttled,
                malformed = stats.malformed,
                replaced = stats.replaced,
                "Frame dispatch progress"
            );
        }
        outcome
    }
}
