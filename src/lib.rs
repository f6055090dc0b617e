#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Multi-resolution min/max envelope pyramid.
pub mod envelope;
/// Shared error and result types.
pub mod error;
/// Analog-to-logic conversion helpers.
pub mod logic;
/// Segment façade, iterators and notifications.
pub mod segment;
/// Chunked append-only sample storage.
pub mod storage;
/// Miscellaneous helpers consumed by segments.
pub mod util;

#[cfg(feature = "async")]
pub mod async_support;
#[cfg(feature = "serde")]
pub mod serde_support;
#[cfg(feature = "simd")]
mod simd;

#[cfg(feature = "async")]
pub use async_support::{ProgressWatcher, SegmentProgress};
pub use envelope::{EnvelopePair, EnvelopePyramid, EnvelopeSection, LevelInfo};
pub use error::{Error, Result};
pub use logic::SchmittTrigger;
#[cfg(feature = "serde")]
pub use serde_support::{SegmentSnapshot, snapshot_segment};
pub use segment::{
    CompactionOutcome, ListenerId, SampleIterator, Segment, SegmentBuilder, SegmentEvent,
    SegmentOptions, SegmentStats,
};
pub use storage::{ChunkCursor, ChunkedBuffer, MAX_CHUNK_SIZE};
