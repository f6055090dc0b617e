//! Multi-resolution min/max summaries of the raw sample stream.
//!
//! Level 0 holds one [`EnvelopePair`] per block of `scale_factor` raw samples, level `L` one
//! pair per `scale_factor` pairs of level `L - 1`. Levels only ever grow at their end: a pair
//! is written once its whole block is available and never touched again.

use std::fmt;
use std::mem;
use std::ops::Range;

use smallvec::SmallVec;
use tracing::trace;

use crate::error::{Error, Result};
use crate::storage::ChunkedBuffer;

mod reduce;
mod section;

pub use section::{EnvelopePair, EnvelopeSection};

/// Default number of envelope levels.
pub const DEFAULT_LEVEL_COUNT: usize = 10;
/// Default base-2 logarithm of the scale factor between adjacent levels.
pub const DEFAULT_SCALE_POWER: u32 = 4;
/// Level storage grows in multiples of this many bytes.
pub const ENVELOPE_DATA_UNIT: usize = 64 * 1024;

const PAIRS_PER_UNIT: usize = ENVELOPE_DATA_UNIT / mem::size_of::<EnvelopePair>();

/// Length, capacity and resolution of one envelope level.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LevelInfo {
    /// Number of valid pairs.
    pub length: usize,
    /// Number of pairs the level can hold without reallocating.
    pub capacity: usize,
    /// Raw samples summarised by each pair.
    pub scale: u64,
    /// Seconds covered by each pair.
    pub time_stride: f64,
}

#[derive(Default)]
struct EnvelopeLevel {
    pairs: Vec<EnvelopePair>,
}

impl EnvelopeLevel {
    /// Makes room for `length` pairs, growing capacity in whole data units.
    fn reserve(&mut self, length: usize) -> Result<()> {
        if length <= self.pairs.capacity() {
            return Ok(());
        }
        let target = length.div_ceil(PAIRS_PER_UNIT) * PAIRS_PER_UNIT;
        let additional = target - self.pairs.len();
        self.pairs
            .try_reserve_exact(additional)
            .map_err(|err| Error::alloc(additional * mem::size_of::<EnvelopePair>(), err))
    }
}

impl fmt::Debug for EnvelopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeLevel")
            .field("length", &self.pairs.len())
            .field("capacity", &self.pairs.capacity())
            .finish()
    }
}

/// Incrementally maintained pyramid of envelope levels.
#[derive(Debug)]
pub struct EnvelopePyramid {
    levels: SmallVec<[EnvelopeLevel; DEFAULT_LEVEL_COUNT]>,
    scale_power: u32,
    bounds: EnvelopePair,
    bounded: u64,
}

impl EnvelopePyramid {
    /// Creates an empty pyramid of `level_count` levels with a scale factor of
    /// `2^scale_power`.
    pub fn new(level_count: usize, scale_power: u32) -> Result<Self> {
        if level_count == 0 {
            return Err(Error::config("envelope needs at least one level"));
        }
        if scale_power == 0 {
            return Err(Error::config("envelope scale power may not be zero"));
        }
        let top_power = (level_count as u64).saturating_mul(scale_power as u64);
        if top_power >= 64 {
            return Err(Error::config(format!(
                "{level_count} levels with scale power {scale_power} exceed 64-bit sample indices"
            )));
        }
        Ok(Self {
            levels: (0..level_count).map(|_| EnvelopeLevel::default()).collect(),
            scale_power,
            bounds: EnvelopePair::EMPTY,
            bounded: 0,
        })
    }

    /// Number of levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Base-2 logarithm of the scale factor.
    pub fn scale_power(&self) -> u32 {
        self.scale_power
    }

    /// Ratio between adjacent levels, and between raw samples and level 0.
    pub fn scale_factor(&self) -> usize {
        1 << self.scale_power
    }

    /// Bounds of every sample folded in so far.
    pub fn bounds(&self) -> EnvelopePair {
        self.bounds
    }

    /// Number of valid pairs on `level`.
    pub fn level_len(&self, level: usize) -> Option<usize> {
        self.levels.get(level).map(|l| l.pairs.len())
    }

    /// Pairs of `level` within `range` (in level units).
    pub fn level_pairs(&self, level: usize, range: Range<usize>) -> Option<&[EnvelopePair]> {
        self.levels.get(level)?.pairs.get(range)
    }

    /// Describes every level, given the raw sample period.
    pub fn levels(&self, time_stride: f64) -> SmallVec<[LevelInfo; DEFAULT_LEVEL_COUNT]> {
        self.levels
            .iter()
            .enumerate()
            .map(|(index, level)| {
                let scale = self.level_scale(index);
                LevelInfo {
                    length: level.pairs.len(),
                    capacity: level.pairs.capacity(),
                    scale,
                    time_stride: time_stride * scale as f64,
                }
            })
            .collect()
    }

    /// Bytes held by level storage.
    pub fn memory_usage(&self) -> usize {
        self.levels
            .iter()
            .map(|level| level.pairs.capacity() * mem::size_of::<EnvelopePair>())
            .sum()
    }

    fn level_scale(&self, level: usize) -> u64 {
        1u64 << ((level as u32 + 1) * self.scale_power)
    }

    /// Reserves storage on every level for a raw sample count of `sample_count`.
    ///
    /// Calling this before the samples are stored lets an append fail before any state changes;
    /// [`EnvelopePyramid::extend`] then never has to allocate.
    pub fn reserve(&mut self, sample_count: u64) -> Result<()> {
        let factor = self.scale_factor() as u64;
        let mut length = sample_count / factor;
        for level in self.levels.iter_mut() {
            if length as usize <= level.pairs.len() {
                break;
            }
            level.reserve(length as usize)?;
            length /= factor;
        }
        Ok(())
    }

    /// Brings the pyramid up to date with the first `sample_count` samples of `samples`.
    ///
    /// Returns `true` when the overall bounds widened.
    pub fn extend(&mut self, samples: &ChunkedBuffer<f32>, sample_count: u64) -> Result<bool> {
        debug_assert!(sample_count <= samples.len());
        self.reserve(sample_count)?;

        let factor = self.scale_factor();
        let before = self.bounds;

        let level0 = &mut self.levels[0];
        let prev_len = level0.pairs.len();
        let new_len = (sample_count / factor as u64) as usize;
        if new_len > prev_len {
            let first = prev_len as u64 * factor as u64;
            let last = new_len as u64 * factor as u64;
            for piece in samples.slices(first..last) {
                reduce::reduce_blocks(piece, factor, &mut level0.pairs);
            }
            debug_assert_eq!(level0.pairs.len(), new_len);
            for pair in &level0.pairs[prev_len..] {
                self.bounds = self.bounds.union(*pair);
            }
        }

        // Samples past the last complete block have no level-0 pair yet but still count
        // towards the overall bounds.
        let tail_start = self.bounded.max(new_len as u64 * factor as u64);
        for piece in samples.slices(tail_start..sample_count) {
            self.bounds = self.bounds.union(reduce::min_max(piece));
        }
        self.bounded = self.bounded.max(sample_count);

        if new_len > prev_len {
            self.propagate(factor);
        }

        Ok(self.bounds != before)
    }

    fn propagate(&mut self, factor: usize) {
        for level in 1..self.levels.len() {
            let (lower, upper) = self.levels.split_at_mut(level);
            let src = &lower[level - 1].pairs;
            let dst = &mut upper[0].pairs;

            let prev_len = dst.len();
            let new_len = src.len() / factor;
            if new_len == prev_len {
                break;
            }
            reduce::merge_pairs(&src[prev_len * factor..new_len * factor], factor, dst);
            trace!(level, prev_len, new_len, "extended envelope level");
        }
    }

    /// Picks the coarsest level whose pairs summarise no more than `min_resolution` raw samples
    /// per pair, scaled to the level above the raw data.
    pub fn level_for_resolution(&self, min_resolution: f32) -> usize {
        let steps = (min_resolution.log2() / self.scale_power as f32).floor() as i64 - 1;
        steps.clamp(0, self.levels.len() as i64 - 1) as usize
    }

    /// Copies the pairs covering raw samples `range` at roughly `min_resolution` samples per pair.
    ///
    /// Both ends of `range` are rounded down to the chosen level's grid, so a trailing partial
    /// pair is not included.
    pub fn query(
        &self,
        range: Range<u64>,
        min_resolution: f32,
        sample_count: u64,
        time_stride: f64,
    ) -> Result<EnvelopeSection> {
        if range.start > range.end || range.end > sample_count {
            return Err(Error::range(format!(
                "envelope range {}..{} outside 0..{sample_count}",
                range.start, range.end
            )));
        }
        if !min_resolution.is_finite() || min_resolution <= 0.0 {
            return Err(Error::range(format!(
                "minimum resolution must be positive, got {min_resolution}"
            )));
        }

        let level = self.level_for_resolution(min_resolution);
        let scale_power = (level as u32 + 1) * self.scale_power;
        let start = (range.start >> scale_power) as usize;
        let end = (range.end >> scale_power) as usize;
        let source = self.level_pairs(level, start..end).ok_or_else(|| {
            Error::range(format!(
                "level {level} holds {} pairs, {start}..{end} requested",
                self.levels[level].pairs.len()
            ))
        })?;

        let mut pairs = Vec::new();
        pairs
            .try_reserve_exact(source.len())
            .map_err(|err| Error::alloc(source.len() * mem::size_of::<EnvelopePair>(), err))?;
        pairs.extend_from_slice(source);

        let scale = 1u64 << scale_power;
        Ok(EnvelopeSection {
            start: start as u64,
            scale,
            time_stride: time_stride * scale as f64,
            pairs,
        })
    }
}
