use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Notification emitted by a [`Segment`](super::Segment).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SegmentEvent {
    /// Samples `start..end` became readable.
    SamplesAdded {
        /// Index of the first new sample.
        start: u64,
        /// Sample count after the append.
        end: u64,
    },
    /// The overall bounds widened.
    MinMaxChanged {
        /// New lower bound.
        min: f32,
        /// New upper bound.
        max: f32,
    },
    /// The segment was marked complete.
    Completed,
}

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) type Listener = Arc<dyn Fn(&SegmentEvent) + Send + Sync>;

/// Registry of synchronous event listeners.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    entries: RwLock<Vec<(ListenerId, Listener)>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    /// Calls every listener registered when the event was raised. The registry is released
    /// first so listeners may add or remove entries.
    pub(crate) fn emit(&self, event: &SegmentEvent) {
        let snapshot: SmallVec<[Listener; 4]> = self
            .entries
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.read().len())
            .finish()
    }
}
