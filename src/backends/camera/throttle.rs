// SPDX-License-Identifier: GPL-3.0-only

//! Software frame-rate limiting
//!
//! Sensors usually run faster than the detection pipeline can consume.
//! The throttle keeps a schedule of when the next frame is due and rejects
//! anything that arrives earlier, before any conversion work is spent on
//! it. The schedule advances by one interval per accepted frame, so a
//! sensor running at a near multiple of the target rate still yields the
//! target rate instead of rounding down to the next slower multiple.

use super::types::Framerate;
use std::time::{Duration, Instant};

/// Minimum-interval gate for incoming frames
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    min_interval: Duration,
    next_due: Option<Instant>,
}

impl FrameThrottle {
    /// Create a throttle that accepts at most one frame per `min_interval`
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_due: None,
        }
    }

    /// Create a throttle for a target output rate (15 fps -> ~66ms)
    pub fn from_framerate(rate: Framerate) -> Self {
        Self::new(rate.frame_interval())
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Whether a frame arriving at `now` would be accepted
    ///
    /// Does not move the schedule; call [`commit`](Self::commit) once the
    /// frame has actually been forwarded.
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due.is_none_or(|due| now >= due)
    }

    /// Record a frame accepted at `now` and schedule the next one
    ///
    /// A source that fell more than one interval behind is resynced to
    /// `now` instead of being allowed to burst.
    pub fn commit(&mut self, now: Instant) {
        let next = match self.next_due {
            Some(due) if due + self.min_interval > now => due + self.min_interval,
            _ => now + self.min_interval,
        };
        self.next_due = Some(next);
    }

    /// Check and commit in one step
    pub fn admit(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.commit(now);
        true
    }

    /// Forget the schedule (used when a capture restarts)
    pub fn reset(&mut self) {
        self.next_due = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_forwarded(throttle: &mut FrameThrottle, arrival_step: Duration, window: Duration) -> u32 {
        let origin = Instant::now();
        let mut forwarded = 0;
        let mut offset = Duration::ZERO;
        while offset < window {
            if throttle.admit(origin + offset) {
                forwarded += 1;
            }
            offset += arrival_step;
        }
        forwarded
    }

    #[test]
    fn test_first_frame_always_accepted() {
        let mut throttle = FrameThrottle::new(Duration::from_millis(66));
        assert!(throttle.admit(Instant::now()));
    }

    #[test]
    fn test_fast_arrivals_are_limited_to_window_over_interval() {
        let rate = Framerate::from_int(15);
        let window = Duration::from_secs(2);

        for step_ms in [1u64, 5, 10, 33] {
            let mut throttle = FrameThrottle::from_framerate(rate);
            let forwarded = count_forwarded(&mut throttle, Duration::from_millis(step_ms), window);
            let expected = window.as_secs_f64() / throttle.min_interval().as_secs_f64();
            assert!(
                (forwarded as f64 - expected).abs() <= 1.0,
                "step {}ms forwarded {} frames, expected ~{:.1}",
                step_ms,
                forwarded,
                expected
            );
        }
    }

    #[test]
    fn test_slow_arrivals_all_pass() {
        let mut throttle = FrameThrottle::new(Duration::from_millis(66));
        let forwarded = count_forwarded(
            &mut throttle,
            Duration::from_millis(100),
            Duration::from_secs(1),
        );
        assert_eq!(forwarded, 10);
    }

    #[test]
    fn test_rejected_frame_does_not_move_reference() {
        let mut throttle = FrameThrottle::new(Duration::from_millis(50));
        let t0 = Instant::now();
        assert!(throttle.admit(t0));
        assert!(!throttle.admit(t0 + Duration::from_millis(30)));
        // 50ms after the accepted frame, not after the rejected one
        assert!(throttle.admit(t0 + Duration::from_millis(50)));
    }

    #[test]
    fn test_sensor_at_twice_target_rate_keeps_target_rate() {
        // 30 fps sensor against a 15 fps target: every other frame passes
        let mut throttle = FrameThrottle::from_framerate(Framerate::from_int(15));
        let forwarded = count_forwarded(
            &mut throttle,
            Duration::from_millis(33),
            Duration::from_secs(2),
        );
        assert_eq!(forwarded, 30);
    }

    #[test]
    fn test_jittered_arrivals_stay_near_target_rate() {
        let mut throttle = FrameThrottle::from_framerate(Framerate::from_int(15));
        let origin = Instant::now();
        let window = Duration::from_secs(3);
        let mut offset = Duration::ZERO;
        let mut forwarded = 0u32;
        let mut i = 0u64;
        while offset < window {
            if throttle.admit(origin + offset) {
                forwarded += 1;
            }
            // 33ms nominal with a repeating -4..+4ms jitter
            offset += Duration::from_millis(29 + (i * 7) % 9);
            i += 1;
        }
        let expected = window.as_secs_f64() / throttle.min_interval().as_secs_f64();
        assert!(
            (forwarded as f64 - expected).abs() <= 1.0,
            "forwarded {} frames, expected ~{:.1}",
            forwarded,
            expected
        );
    }

    #[test]
    fn test_unconfirmed_frame_does_not_move_schedule() {
        let mut throttle = FrameThrottle::new(Duration::from_millis(50));
        let t0 = Instant::now();
        assert!(throttle.is_due(t0));
        // Checked but never committed
        assert!(throttle.is_due(t0 + Duration::from_millis(5)));
        throttle.commit(t0 + Duration::from_millis(5));
        assert!(!throttle.is_due(t0 + Duration::from_millis(50)));
        assert!(throttle.is_due(t0 + Duration::from_millis(55)));
    }

    #[test]
    fn test_stalled_source_is_resynced() {
        let mut throttle = FrameThrottle::new(Duration::from_millis(50));
        let t0 = Instant::now();
        assert!(throttle.admit(t0));
        // Long stall, then a fast burst: only one frame passes per interval
        assert!(throttle.admit(t0 + Duration::from_millis(500)));
        assert!(!throttle.admit(t0 + Duration::from_millis(510)));
        assert!(!throttle.admit(t0 + Duration::from_millis(540)));
        assert!(throttle.admit(t0 + Duration::from_millis(550)));
    }

    #[test]
    fn test_reset_accepts_next_frame() {
        let mut throttle = FrameThrottle::new(Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(throttle.admit(t0));
        throttle.reset();
        assert!(throttle.admit(t0 + Duration::from_millis(1)));
    }
}
