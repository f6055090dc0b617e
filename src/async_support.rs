//! Async helpers for consumers that await segment progress instead of registering listeners.

use tokio::sync::watch;

use crate::segment::Segment;

/// Snapshot of a segment's progress, published after every event.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SegmentProgress {
    /// Committed samples.
    pub sample_count: u64,
    /// Whether the segment was marked complete.
    pub complete: bool,
    /// Overall sample bounds, once any sample arrived.
    pub bounds: Option<(f32, f32)>,
}

/// Receiver side of a segment's progress channel.
#[derive(Debug, Clone)]
pub struct ProgressWatcher {
    inner: watch::Receiver<SegmentProgress>,
}

impl ProgressWatcher {
    /// Latest published progress.
    pub fn current(&self) -> SegmentProgress {
        *self.inner.borrow()
    }

    /// Waits until at least `count` samples are readable or the segment completes.
    ///
    /// Returns `None` if the segment was dropped first.
    pub async fn wait_for_samples(&mut self, count: u64) -> Option<SegmentProgress> {
        self.inner
            .wait_for(|progress| progress.sample_count >= count || progress.complete)
            .await
            .ok()
            .map(|progress| *progress)
    }

    /// Waits until the segment is marked complete.
    pub async fn wait_for_completion(&mut self) -> Option<SegmentProgress> {
        self.inner
            .wait_for(|progress| progress.complete)
            .await
            .ok()
            .map(|progress| *progress)
    }
}

impl Segment {
    /// Subscribes to progress updates.
    pub fn watch(&self) -> ProgressWatcher {
        ProgressWatcher {
            inner: self.progress_sender().subscribe(),
        }
    }
}
