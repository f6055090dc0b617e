//! Helper utilities for exporting segment metadata through `serde`.

use serde::Serialize;

use crate::envelope::LevelInfo;
use crate::segment::{Segment, SegmentStats};

/// Serializable summary of a segment: identity, timing, bounds and envelope shape.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentSnapshot {
    /// Segment identifier.
    pub id: u32,
    /// Acquisition time of the first sample, in seconds.
    pub start_time: f64,
    /// Samples per second.
    pub samplerate: f64,
    /// Whether the segment was marked complete.
    pub complete: bool,
    /// Smallest sample, once any sample arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    /// Largest sample, once any sample arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
    /// Storage usage.
    pub stats: SegmentStats,
    /// Envelope levels that hold at least one pair.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub levels: Vec<LevelInfo>,
}

/// Captures a [`SegmentSnapshot`] of `segment`.
pub fn snapshot_segment(segment: &Segment) -> SegmentSnapshot {
    let bounds = segment.min_max();
    SegmentSnapshot {
        id: segment.id(),
        start_time: segment.start_time(),
        samplerate: segment.samplerate(),
        complete: segment.is_complete(),
        min: bounds.map(|(min, _)| min),
        max: bounds.map(|(_, max)| max),
        stats: segment.stats(),
        levels: segment
            .envelope_levels()
            .into_iter()
            .filter(|level| level.length > 0)
            .collect(),
    }
}
