use crate::error::{Error, Result};
use crate::storage::ChunkCursor;

use super::Segment;

/// Sequential cursor over the samples of a [`Segment`].
///
/// The sample count is captured when the iterator begins; samples appended later are not
/// visited. While any iterator is alive the segment defers compaction, and the last iterator
/// to end runs a compaction requested in the meantime. Ending happens on drop, so early exits
/// release the iterator too.
#[derive(Debug)]
pub struct SampleIterator<'a> {
    segment: &'a Segment,
    cursor: ChunkCursor,
    chunk_len: usize,
    index: u64,
    end: u64,
}

impl<'a> SampleIterator<'a> {
    pub(super) fn begin(segment: &'a Segment, start: u64) -> Result<Self> {
        let mut state = segment.state.lock();
        let end = segment.sample_count();
        if start > end {
            return Err(Error::out_of_range(start, end));
        }
        state.iterators += 1;
        Ok(Self {
            segment,
            cursor: state.samples.cursor(start),
            chunk_len: state.samples.chunk_len(),
            index: start,
            end,
        })
    }

    /// Index of the sample the iterator points at.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Sample count captured when the iterator began.
    pub fn end_index(&self) -> u64 {
        self.end
    }

    /// Samples left before the captured end.
    pub fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.index)
    }

    /// Moves forward by `count` samples. Moving past the captured end is allowed, but
    /// [`SampleIterator::value`] then fails.
    pub fn advance(&mut self, count: u64) {
        self.index = self.index.saturating_add(count);
        self.cursor.advance(count, self.chunk_len);
    }

    /// Sample under the cursor.
    pub fn value(&self) -> Result<f32> {
        if self.index >= self.end {
            return Err(Error::out_of_range(self.index, self.end));
        }
        self.segment
            .state
            .lock()
            .samples
            .value_at(self.cursor)
            .ok_or_else(|| Error::out_of_range(self.index, self.end))
    }

    /// Copies up to `dest.len()` samples into `dest` and advances past them. Returns the number
    /// of samples copied.
    pub fn read(&mut self, dest: &mut [f32]) -> usize {
        let count = (dest.len() as u64).min(self.remaining());
        let mut filled = 0usize;
        {
            let state = self.segment.state.lock();
            for piece in state.samples.slices(self.index..self.index + count) {
                dest[filled..filled + piece.len()].copy_from_slice(piece);
                filled += piece.len();
            }
        }
        self.advance(filled as u64);
        filled
    }

    /// Ends the traversal.
    pub fn end(self) {}
}

impl Iterator for SampleIterator<'_> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.index >= self.end {
            return None;
        }
        let value = self.segment.state.lock().samples.value_at(self.cursor)?;
        self.advance(1);
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl Drop for SampleIterator<'_> {
    fn drop(&mut self) {
        self.segment.release_iterator();
    }
}
