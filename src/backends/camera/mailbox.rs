// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot, latest-wins frame hand-off
//!
//! The capture thread must never block on a slow consumer, and a consumer
//! that falls behind only cares about the newest frame. The mailbox holds
//! at most one frame: posting replaces (and drops) whatever is still
//! pending, receiving moves the frame out. Nothing is shared; each frame
//! has exactly one owner at a time.

use super::types::NormalizedFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Default)]
struct Slot {
    frame: Option<NormalizedFrame>,
    closed: bool,
}

#[derive(Default)]
struct Shared {
    slot: Mutex<Slot>,
    notify: Notify,
    posted: AtomicU64,
    replaced: AtomicU64,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a connected sender/receiver pair
pub fn frame_mailbox() -> (FrameSender, FrameReceiver) {
    let shared = Arc::new(Shared::default());
    (FrameSender(Arc::clone(&shared)), FrameReceiver(shared))
}

/// Producer side, owned by the capture context
#[derive(Clone)]
pub struct FrameSender(Arc<Shared>);

/// Outcome of posting a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// The slot was empty
    Delivered,
    /// An unconsumed frame was dropped in favor of this one
    ReplacedPending,
    /// The receiver side closed the mailbox; the frame was dropped
    Closed,
}

impl FrameSender {
    /// Move a frame into the slot, replacing any pending frame
    pub fn post(&self, frame: NormalizedFrame) -> PostOutcome {
        let outcome = {
            let mut slot = self.0.slot();
            if slot.closed {
                return PostOutcome::Closed;
            }
            match slot.frame.replace(frame) {
                Some(_) => PostOutcome::ReplacedPending,
                None => PostOutcome::Delivered,
            }
        };

        self.0.posted.fetch_add(1, Ordering::Relaxed);
        if outcome == PostOutcome::ReplacedPending {
            self.0.replaced.fetch_add(1, Ordering::Relaxed);
        }
        self.0.notify.notify_one();
        outcome
    }

    /// Re-open a closed mailbox for a new capture run
    pub fn reopen(&self) {
        let mut slot = self.0.slot();
        slot.closed = false;
        slot.frame = None;
    }

    /// Close the mailbox and wake a waiting receiver
    pub fn close(&self) {
        close_shared(&self.0);
    }

    /// Create another receiver for this mailbox
    pub fn subscribe(&self) -> FrameReceiver {
        FrameReceiver(Arc::clone(&self.0))
    }
}

fn close_shared(shared: &Shared) {
    {
        let mut slot = shared.slot();
        slot.closed = true;
        slot.frame = None;
    }
    shared.notify.notify_waiters();
    shared.notify.notify_one();
}

/// Consumer side
///
/// Clones share the same slot; whichever receiver takes the frame first
/// owns it.
#[derive(Clone)]
pub struct FrameReceiver(Arc<Shared>);

impl FrameReceiver {
    /// Wait for the next frame
    ///
    /// Returns `None` once the mailbox is closed.
    pub async fn recv(&self) -> Option<NormalizedFrame> {
        loop {
            {
                let mut slot = self.0.slot();
                if let Some(frame) = slot.frame.take() {
                    return Some(frame);
                }
                if slot.closed {
                    return None;
                }
            }
            // notify_one stores a permit, so a post between the check
            // above and this await is not lost
            self.0.notify.notified().await;
        }
    }

    /// Take the pending frame without waiting
    pub fn try_recv(&self) -> Option<NormalizedFrame> {
        self.0.slot().frame.take()
    }

    /// Close the mailbox from the consumer side
    pub fn close(&self) {
        close_shared(&self.0);
    }

    pub fn is_closed(&self) -> bool {
        self.0.slot().closed
    }

    /// Total frames posted since creation
    pub fn posted(&self) -> u64 {
        self.0.posted.load(Ordering::Relaxed)
    }

    /// Frames dropped because a newer one replaced them before consumption
    pub fn replaced(&self) -> u64 {
        self.0.replaced.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn frame(sequence: u64) -> NormalizedFrame {
        NormalizedFrame::new(vec![0; 4], 1, 1, sequence)
    }

    #[test]
    fn test_latest_frame_wins() {
        let (tx, rx) = frame_mailbox();
        assert_eq!(tx.post(frame(1)), PostOutcome::Delivered);
        assert_eq!(tx.post(frame(2)), PostOutcome::ReplacedPending);
        assert_eq!(tx.post(frame(3)), PostOutcome::ReplacedPending);

        assert_eq!(rx.try_recv().map(|f| f.sequence), Some(3));
        assert!(rx.try_recv().is_none());
        assert_eq!(rx.posted(), 3);
        assert_eq!(rx.replaced(), 2);
    }

    #[tokio::test]
    async fn test_recv_waits_for_post() {
        let (tx, rx) = frame_mailbox();
        let handle = tokio::spawn(async move { rx.recv().await.map(|f| f.sequence) });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.post(frame(7));

        let received = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, Some(7));
    }

    #[tokio::test]
    async fn test_close_wakes_receiver() {
        let (tx, rx) = frame_mailbox();
        let handle = tokio::spawn(async move { rx.recv().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.close();

        let received = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(received.is_none());
    }

    #[test]
    fn test_post_after_close_is_dropped_until_reopen() {
        let (tx, rx) = frame_mailbox();
        tx.close();
        assert_eq!(tx.post(frame(1)), PostOutcome::Closed);
        assert!(rx.try_recv().is_none());

        tx.reopen();
        assert_eq!(tx.post(frame(2)), PostOutcome::Delivered);
        assert_eq!(rx.try_recv().map(|f| f.sequence), Some(2));
    }
}
