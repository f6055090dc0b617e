#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lower and upper bound of a run of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnvelopePair {
    /// Smallest sample in the run.
    pub min: f32,
    /// Largest sample in the run.
    pub max: f32,
}

impl EnvelopePair {
    /// Bounds of an empty run. Any sample widens it.
    pub const EMPTY: Self = Self {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };

    /// Returns `true` if no sample has been folded into the pair.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Smallest pair bounding both `self` and `other`.
    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: if other.min < self.min { other.min } else { self.min },
            max: if other.max > self.max { other.max } else { self.max },
        }
    }

    /// Returns `true` if `value` lies within the pair.
    pub fn contains(&self, value: f32) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Owned slice of one envelope level returned by an envelope query.
///
/// `start` is expressed in entries of the chosen level, not in raw samples. Use
/// [`EnvelopeSection::first_sample`] to map it back onto the raw sample axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnvelopeSection {
    /// Index of the first pair within its level.
    pub start: u64,
    /// Number of raw samples summarised by each pair.
    pub scale: u64,
    /// Seconds covered by each pair.
    pub time_stride: f64,
    /// Copied pairs.
    pub pairs: Vec<EnvelopePair>,
}

impl EnvelopeSection {
    /// Number of pairs in the section.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` if the section holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Raw sample index of the first sample summarised by the section.
    pub fn first_sample(&self) -> u64 {
        self.start * self.scale
    }

    /// Raw sample range summarised by the pair at `position` within the section.
    pub fn sample_span(&self, position: usize) -> std::ops::Range<u64> {
        let first = (self.start + position as u64) * self.scale;
        first..first + self.scale
    }

    /// Consumes the section, returning the pair buffer.
    pub fn into_pairs(self) -> Vec<EnvelopePair> {
        self.pairs
    }
}
